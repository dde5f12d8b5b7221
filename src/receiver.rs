//! The upload receiver: a single `POST /api/upload` endpoint that persists one
//! multipart `image` file per request under the uploads directory.

use std::{
    io::ErrorKind::AlreadyExists,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{multipart::Field, Extension, Multipart},
    http::StatusCode,
    routing::{get_service, post},
    Json, Router,
};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::{config::ReceiverConfig, error::ReceiveError, models::UploadResponse};

pub const UPLOAD_ROUTE: &str = "/api/upload";
pub const IMAGE_FIELD: &str = "image";

const SUFFIX_LEN: usize = 6;
const MAX_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
}

pub fn build_router(config: ReceiverConfig) -> Router {
    let static_dir = config.static_dir.clone();
    let router = Router::new()
        .route(UPLOAD_ROUTE, post(post_upload))
        .layer(Extension(Arc::new(config)));

    let router = match static_dir {
        Some(dir) => router.fallback(get_service(ServeDir::new(dir)).handle_error(
            |err: std::io::Error| async move {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to serve files: {}", err),
                )
            },
        )),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn post_upload(
    Extension(config): Extension<Arc<ReceiverConfig>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ReceiveError> {
    match receive_upload(&config.uploads_dir, multipart).await? {
        Some(stored) => {
            info!(
                original_name = %stored.original_name,
                stored_name = %stored.stored_name,
                size = stored.size,
                "File uploaded"
            );
        }
        None if config.require_image_field => return Err(ReceiveError::MissingImage),
        None => warn!("upload request carried no image field"),
    }

    Ok(Json(UploadResponse::success()))
}

pub async fn receive_upload(
    uploads_dir: &Path,
    mut multipart: Multipart,
) -> Result<Option<StoredFile>, ReceiveError> {
    let mut stored: Option<StoredFile> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let original_name = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != IMAGE_FIELD || stored.is_some() {
            return Err(ReceiveError::UnexpectedField(field_name));
        }

        stored = Some(store_field(uploads_dir, original_name, &mut field).await?);
    }

    Ok(stored)
}

async fn store_field(
    uploads_dir: &Path,
    original_name: String,
    field: &mut Field<'_>,
) -> Result<StoredFile, ReceiveError> {
    let millis = chrono::Utc::now().timestamp_millis();
    let ext = extension_of(&original_name);
    let (mut file, stored_name) = create_unique(uploads_dir, millis, &ext).await?;

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(StoredFile {
        path: uploads_dir.join(&stored_name),
        original_name,
        stored_name,
        size,
    })
}

/// Opens a new file named `<millis><ext>`, falling back to
/// `<millis>-<suffix><ext>` when that name is already taken.
pub async fn create_unique(
    dir: &Path,
    millis: i64,
    ext: &str,
) -> Result<(File, String), ReceiveError> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            stored_name(millis, ext)
        } else {
            format!("{}-{}{}", millis, generate_suffix(), ext)
        };

        let opened = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await;
        match opened {
            Ok(file) => return Ok((file, name)),
            Err(err) if err.kind() == AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(ReceiveError::NameExhausted)
}

pub fn stored_name(millis: i64, ext: &str) -> String {
    format!("{}{}", millis, ext)
}

// Last extension with its dot; empty for dot-files, `..` and non-alphanumeric extensions.
pub fn extension_of(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    if base == ".." {
        return String::new();
    }
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => {
            let ext = &base[idx + 1..];
            if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                format!(".{}", ext)
            } else {
                String::new()
            }
        }
    }
}

fn generate_suffix() -> String {
    let mut rng = thread_rng();

    (0..SUFFIX_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect::<String>()
}
