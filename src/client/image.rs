use std::{fmt, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;

/// Stable identity of a pending image, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(u64);

impl ImageId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

/// A file handed to the selector: name, declared MIME type and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Pending,
    Uploaded,
}

#[derive(Debug, Clone)]
pub struct PendingImage {
    pub id: ImageId,
    pub file: SourceFile,
    pub preview_url: Arc<str>,
    pub status: ImageStatus,
}

impl PendingImage {
    pub(crate) fn new(id: ImageId, file: SourceFile) -> Self {
        let preview_url = data_url(&file.mime, &file.bytes).into();
        Self {
            id,
            file,
            preview_url,
            status: ImageStatus::Pending,
        }
    }

    /// Size in MiB with two decimals, e.g. `"1.50"`.
    pub fn size_label(&self) -> String {
        format!("{:.2}", self.file.size() as f64 / (1024.0 * 1024.0))
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_a_data_url_of_the_contents() {
        let image = PendingImage::new(
            ImageId::new(7),
            SourceFile::new("a.png", "image/png", vec![1u8, 2, 3]),
        );
        assert_eq!(&*image.preview_url, "data:image/png;base64,AQID");
        assert_eq!(image.status, ImageStatus::Pending);
        assert_eq!(image.id.to_string(), "img-7");
    }

    #[test]
    fn size_label_is_mebibytes() {
        let image = PendingImage::new(
            ImageId::new(0),
            SourceFile::new("b.jpg", "image/jpeg", vec![0u8; 1_572_864]),
        );
        assert_eq!(image.size_label(), "1.50");
    }
}
