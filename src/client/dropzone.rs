use super::image::SourceFile;

pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    FileTooLarge,
    FileInvalidType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub file: SourceFile,
    pub reasons: Vec<RejectionReason>,
}

#[derive(Debug, Clone)]
pub struct DropZone {
    accept: Vec<String>,
    max_size: u64,
}

impl Default for DropZone {
    fn default() -> Self {
        Self {
            accept: ACCEPTED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            max_size: MAX_FILE_SIZE,
        }
    }
}

impl DropZone {
    pub fn new(accept: Vec<String>, max_size: u64) -> Self {
        Self { accept, max_size }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn accepts_type(&self, mime: &str) -> bool {
        self.accept.iter().any(|a| a.eq_ignore_ascii_case(mime.trim()))
    }

    pub fn filter(&self, files: Vec<SourceFile>) -> (Vec<SourceFile>, Vec<RejectedFile>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for file in files {
            let mut reasons = Vec::new();
            if !self.accepts_type(&file.mime) {
                reasons.push(RejectionReason::FileInvalidType);
            }
            if file.size() > self.max_size {
                reasons.push(RejectionReason::FileTooLarge);
            }

            if reasons.is_empty() {
                accepted.push(file);
            } else {
                rejected.push(RejectedFile { file, reasons });
            }
        }

        (accepted, rejected)
    }
}

pub fn mime_from_name(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: usize) -> SourceFile {
        SourceFile::new(name, mime, vec![0u8; size])
    }

    #[test]
    fn oversized_png_is_filtered_out() {
        let zone = DropZone::default();
        let (accepted, rejected) = zone.filter(vec![
            file("a.jpg", "image/jpeg", 1024),
            file("b.jpg", "image/jpeg", 4 * 1024 * 1024),
            file("c.png", "image/png", 6 * 1024 * 1024),
        ]);

        let names: Vec<_> = accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].file.name, "c.png");
        assert_eq!(rejected[0].reasons, [RejectionReason::FileTooLarge]);
    }

    #[test]
    fn limit_is_inclusive() {
        let zone = DropZone::default();
        let (accepted, rejected) = zone.filter(vec![
            file("exact.png", "image/png", MAX_FILE_SIZE as usize),
            file("over.png", "image/png", MAX_FILE_SIZE as usize + 1),
        ]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(rejected[0].file.name, "over.png");
    }

    #[test]
    fn other_types_are_rejected_with_every_reason() {
        let zone = DropZone::default();
        let (accepted, rejected) = zone.filter(vec![
            file("anim.gif", "image/gif", 10),
            file("huge.pdf", "application/pdf", 6 * 1024 * 1024),
        ]);
        assert!(accepted.is_empty());
        assert_eq!(rejected[0].reasons, [RejectionReason::FileInvalidType]);
        assert_eq!(
            rejected[1].reasons,
            [RejectionReason::FileInvalidType, RejectionReason::FileTooLarge]
        );
    }

    #[test]
    fn mime_guess_covers_accepted_extensions() {
        assert_eq!(mime_from_name("x.JPG"), "image/jpeg");
        assert_eq!(mime_from_name("x.jpeg"), "image/jpeg");
        assert_eq!(mime_from_name("x.png"), "image/png");
        assert_eq!(mime_from_name("x.webp"), "application/octet-stream");
    }
}
