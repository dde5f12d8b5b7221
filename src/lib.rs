pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod receiver;

pub use config::ReceiverConfig;
pub use error::{ConfigError, ReceiveError};
pub use receiver::{build_router, IMAGE_FIELD, UPLOAD_ROUTE};
