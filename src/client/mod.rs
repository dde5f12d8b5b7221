pub mod crop;
pub mod dropzone;
pub mod image;
pub mod state;
pub mod upload;

pub use self::crop::{CropError, CropRect, CropWorkspace, CroppedImage};
pub use self::dropzone::{DropZone, RejectedFile, RejectionReason};
pub use self::image::{ImageId, ImageStatus, PendingImage, SourceFile};
pub use self::state::{Action, Limits, SelectorError, UploaderState};
pub use self::upload::{HttpTransport, TransferError, Transport, UploadReport, Uploader};
