//! The image selector state machine.
//!
//! [`UploaderState`] is an immutable snapshot. Every user or transfer event
//! is an [`Action`]; [`UploaderState::reduce`] returns the next snapshot. A
//! rejected action leaves everything untouched except the error banner.

use std::collections::BTreeMap;

use thiserror::Error;

use super::crop::{self, CropError, CropRect, CropWorkspace};
use super::image::{ImageId, ImageStatus, PendingImage, SourceFile};

pub const MAX_IMAGES: usize = 5;
pub const MAX_SELECTED: usize = 5;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("You can only upload up to {0} images.")]
    TooManyImages(usize),
    #[error("You have reached the limit of {0} images.")]
    SelectionFull(usize),
    #[error("Upload failed. Please try again.")]
    TransferFailed,
    #[error("no image with id {0}")]
    UnknownImage(ImageId),
    #[error("no crop in progress")]
    NoCropInProgress,
    #[error("Crop failed: {0}")]
    Crop(#[from] CropError),
}

#[derive(Debug, Clone)]
pub enum Action {
    AddImages(Vec<SourceFile>),
    ToggleSelect(ImageId),
    DeleteImage(ImageId),
    Cancel,
    DismissError,
    Progress { id: ImageId, loaded: u64, total: u64 },
    UploadSucceeded(ImageId),
    UploadFailed { id: ImageId, reason: String },
    BeginCrop(ImageId),
    SetAspect(Option<f64>),
    SetCrop(CropRect),
    EndCrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_images: usize,
    pub max_selected: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_images: MAX_IMAGES,
            max_selected: MAX_SELECTED,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploaderState {
    limits: Limits,
    images: Vec<PendingImage>,
    selection: Vec<ImageId>,
    progress: BTreeMap<ImageId, f64>,
    failures: BTreeMap<ImageId, String>,
    error: Option<String>,
    crop: Option<CropWorkspace>,
    next_id: u64,
}

impl UploaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn images(&self) -> &[PendingImage] {
        &self.images
    }

    pub fn image(&self, id: ImageId) -> Option<&PendingImage> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Id of the image shown at `position` in the list.
    pub fn id_at(&self, position: usize) -> Option<ImageId> {
        self.images.get(position).map(|img| img.id)
    }

    /// Selected ids in selection order.
    pub fn selection(&self) -> &[ImageId] {
        &self.selection
    }

    pub fn is_selected(&self, id: ImageId) -> bool {
        self.selection.contains(&id)
    }

    pub fn progress(&self, id: ImageId) -> Option<f64> {
        self.progress.get(&id).copied()
    }

    pub fn failure(&self, id: ImageId) -> Option<&str> {
        self.failures.get(&id).map(String::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn crop(&self) -> Option<&CropWorkspace> {
        self.crop.as_ref()
    }

    /// Applies `action` and returns the resulting snapshot.
    pub fn reduce(&self, action: Action) -> UploaderState {
        let mut next = self.clone();
        match next.apply(action) {
            Ok(()) => next,
            Err(err) => {
                let mut unchanged = self.clone();
                unchanged.error = Some(err.to_string());
                unchanged
            }
        }
    }

    fn apply(&mut self, action: Action) -> Result<(), SelectorError> {
        match action {
            Action::AddImages(files) => self.add_images(files),
            Action::ToggleSelect(id) => self.toggle_select(id),
            Action::DeleteImage(id) => self.delete_image(id),
            Action::Cancel => {
                self.selection.clear();
                Ok(())
            }
            Action::DismissError => {
                self.error = None;
                Ok(())
            }
            Action::Progress { id, loaded, total } => {
                self.record_progress(id, loaded, total);
                Ok(())
            }
            Action::UploadSucceeded(id) => {
                if let Some(image) = self.images.iter_mut().find(|img| img.id == id) {
                    image.status = ImageStatus::Uploaded;
                    self.progress.insert(id, 100.0);
                    self.failures.remove(&id);
                }
                Ok(())
            }
            Action::UploadFailed { id, reason } => {
                if self.image(id).is_some() {
                    self.failures.insert(id, reason);
                }
                self.error = Some(SelectorError::TransferFailed.to_string());
                Ok(())
            }
            Action::BeginCrop(id) => {
                self.require(id)?;
                self.crop = Some(CropWorkspace::new(id));
                Ok(())
            }
            Action::SetAspect(aspect) => {
                let workspace = self.crop.as_mut().ok_or(SelectorError::NoCropInProgress)?;
                workspace.aspect = aspect;
                Ok(())
            }
            Action::SetCrop(rect) => self.set_crop(rect),
            Action::EndCrop => {
                self.crop = None;
                Ok(())
            }
        }
    }

    fn require(&self, id: ImageId) -> Result<&PendingImage, SelectorError> {
        self.image(id).ok_or(SelectorError::UnknownImage(id))
    }

    fn add_images(&mut self, files: Vec<SourceFile>) -> Result<(), SelectorError> {
        if self.images.len() + files.len() > self.limits.max_images {
            return Err(SelectorError::TooManyImages(self.limits.max_images));
        }
        for file in files {
            let id = ImageId::new(self.next_id);
            self.next_id += 1;
            self.images.push(PendingImage::new(id, file));
        }
        Ok(())
    }

    fn toggle_select(&mut self, id: ImageId) -> Result<(), SelectorError> {
        self.require(id)?;
        if let Some(pos) = self.selection.iter().position(|s| *s == id) {
            self.selection.remove(pos);
        } else if self.selection.len() >= self.limits.max_selected {
            return Err(SelectorError::SelectionFull(self.limits.max_selected));
        } else {
            self.selection.push(id);
        }
        self.error = None;
        Ok(())
    }

    fn delete_image(&mut self, id: ImageId) -> Result<(), SelectorError> {
        self.require(id)?;
        self.images.retain(|img| img.id != id);
        self.selection.retain(|s| *s != id);
        self.progress.remove(&id);
        self.failures.remove(&id);
        if self.crop.as_ref().map(|c| c.target) == Some(id) {
            self.crop = None;
        }
        Ok(())
    }

    /// Progress only moves forward; ticks for unknown images are dropped.
    fn record_progress(&mut self, id: ImageId, loaded: u64, total: u64) {
        if self.image(id).is_none() || total == 0 {
            return;
        }
        let pct = (loaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
        let entry = self.progress.entry(id).or_insert(0.0);
        if pct > *entry {
            *entry = pct;
        }
    }

    fn set_crop(&mut self, rect: CropRect) -> Result<(), SelectorError> {
        let workspace = self.crop.as_ref().ok_or(SelectorError::NoCropInProgress)?;
        let rect = rect.constrained(workspace.aspect);
        let source = self.require(workspace.target)?.file.bytes.clone();
        let rendered = crop::rasterize(&source, rect)?;

        if let Some(workspace) = self.crop.as_mut() {
            workspace.rect = Some(rect);
            workspace.result = Some(rendered);
        }
        Ok(())
    }
}
