//! Upload orchestration.
//!
//! `Uploader::upload` starts one transfer per selected image, runs them
//! concurrently and joins them, so every image gets its own outcome. Progress
//! ticks flow back through a channel and are folded into the state as they
//! arrive.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future::join_all, stream, StreamExt};
use reqwest::{
    multipart::{Form, Part},
    Body, Client, StatusCode,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::dropzone::{DropZone, RejectedFile};
use super::image::{ImageId, SourceFile};
use super::state::{Action, UploaderState};
use crate::receiver::{IMAGE_FIELD, UPLOAD_ROUTE};

pub const CHUNK_SIZE: usize = 64 * 1024;
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: ImageId,
    pub file: SourceFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub id: ImageId,
    pub loaded: u64,
    pub total: u64,
}

/// Where a transfer reports how many bytes it has sent so far.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    id: ImageId,
    tx: mpsc::UnboundedSender<ProgressTick>,
}

impl ProgressSink {
    pub fn new(id: ImageId, tx: mpsc::UnboundedSender<ProgressTick>) -> Self {
        Self { id, tx }
    }

    pub fn report(&self, loaded: u64, total: u64) {
        // The receiving side may already be gone; ticks are advisory.
        let _ = self.tx.send(ProgressTick {
            id: self.id,
            loaded,
            total,
        });
    }
}

#[derive(Debug)]
pub struct UploadReport {
    pub id: ImageId,
    pub outcome: Result<(), TransferError>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, job: UploadJob, progress: ProgressSink) -> Result<(), TransferError>;
}

/// Posts each image as multipart field `image` to `<endpoint>/api/upload`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), UPLOAD_ROUTE),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, job: UploadJob, progress: ProgressSink) -> Result<(), TransferError> {
        let total = job.file.size();
        let mut loaded = 0u64;
        let body = stream::iter(split_chunks(job.file.bytes.clone())).map(move |chunk| {
            loaded += chunk.len() as u64;
            progress.report(loaded, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let mime = if job.file.mime.trim().is_empty() {
            FALLBACK_MIME
        } else {
            job.file.mime.as_str()
        };
        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(job.file.name.clone())
            .mime_str(mime)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!(image = %job.id, url = %self.url, bytes = total, "starting upload");
        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status));
        }
        Ok(())
    }
}

fn split_chunks(mut rest: Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(rest.len() / CHUNK_SIZE + 1);
    while !rest.is_empty() {
        let n = rest.len().min(CHUNK_SIZE);
        chunks.push(rest.split_to(n));
    }
    chunks
}

/// Runs every job concurrently and waits for all of them.
pub async fn upload_all<T>(
    transport: &T,
    jobs: Vec<UploadJob>,
    tx: mpsc::UnboundedSender<ProgressTick>,
) -> Vec<UploadReport>
where
    T: Transport + ?Sized,
{
    let transfers = jobs.into_iter().map(|job| {
        let sink = ProgressSink::new(job.id, tx.clone());
        async move {
            let id = job.id;
            let outcome = transport.send(job, sink).await;
            UploadReport { id, outcome }
        }
    });
    join_all(transfers).await
}

/// Owns the selector state and drives uploads through a [`Transport`].
pub struct Uploader<T> {
    state: UploaderState,
    dropzone: DropZone,
    transport: T,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T) -> Self {
        Self::with_parts(UploaderState::new(), DropZone::default(), transport)
    }

    pub fn with_parts(state: UploaderState, dropzone: DropZone, transport: T) -> Self {
        Self {
            state,
            dropzone,
            transport,
        }
    }

    pub fn state(&self) -> &UploaderState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) -> &UploaderState {
        self.state = self.state.reduce(action);
        &self.state
    }

    /// Filters dropped files through the drop-zone and adds the survivors.
    /// Returns the files the drop-zone turned away.
    pub fn drop_files(&mut self, files: Vec<SourceFile>) -> Vec<RejectedFile> {
        let (accepted, rejected) = self.dropzone.filter(files);
        for file in &rejected {
            debug!(name = %file.file.name, reasons = ?file.reasons, "file rejected by drop-zone");
        }
        if !accepted.is_empty() {
            self.dispatch(Action::AddImages(accepted));
        }
        rejected
    }

    /// Uploads every selected image and folds the outcomes into the state.
    pub async fn upload(&mut self) -> Vec<UploadReport> {
        let jobs: Vec<UploadJob> = self
            .state
            .selection()
            .iter()
            .filter_map(|id| self.state.image(*id))
            .map(|img| UploadJob {
                id: img.id,
                file: img.file.clone(),
            })
            .collect();
        if jobs.is_empty() {
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = upload_all(&self.transport, jobs, tx);
        tokio::pin!(run);

        let reports = loop {
            tokio::select! {
                Some(tick) = rx.recv() => {
                    self.state = self.state.reduce(progress_action(tick));
                }
                reports = &mut run => break reports,
            }
        };
        while let Ok(tick) = rx.try_recv() {
            self.state = self.state.reduce(progress_action(tick));
        }

        for report in &reports {
            match &report.outcome {
                Ok(()) => {
                    info!(image = %report.id, "upload succeeded");
                    self.state = self.state.reduce(Action::UploadSucceeded(report.id));
                }
                Err(err) => {
                    warn!(image = %report.id, error = %err, "upload failed");
                    self.state = self.state.reduce(Action::UploadFailed {
                        id: report.id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        reports
    }
}

fn progress_action(tick: ProgressTick) -> Action {
    Action::Progress {
        id: tick.id,
        loaded: tick.loaded,
        total: tick.total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::image::ImageStatus;
    use std::sync::Arc;
    use tokio::sync::{Barrier, Mutex};

    /// Reports half then full progress; names starting with `fail` answer 500.
    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, job: UploadJob, progress: ProgressSink) -> Result<(), TransferError> {
            let total = job.file.size();
            progress.report(total / 2, total);
            self.sent.lock().await.push(job.file.name.clone());
            if job.file.name.starts_with("fail") {
                return Err(TransferError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }
            progress.report(total, total);
            Ok(())
        }
    }

    /// Completes only once `n` transfers are in flight at the same time.
    struct GatedTransport {
        gate: Arc<Barrier>,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn send(&self, _job: UploadJob, _progress: ProgressSink) -> Result<(), TransferError> {
            self.gate.wait().await;
            Ok(())
        }
    }

    fn jpeg(name: &str, size: usize) -> SourceFile {
        SourceFile::new(name, "image/jpeg", vec![7u8; size])
    }

    fn select_all<T: Transport>(uploader: &mut Uploader<T>) {
        let ids: Vec<_> = uploader.state().images().iter().map(|i| i.id).collect();
        for id in ids {
            uploader.dispatch(Action::ToggleSelect(id));
        }
    }

    #[tokio::test]
    async fn drop_filters_before_adding() {
        let mut uploader = Uploader::new(FakeTransport::default());
        let rejected = uploader.drop_files(vec![
            jpeg("a.jpg", 1024),
            jpeg("b.jpg", 2048),
            SourceFile::new("c.png", "image/png", vec![0u8; 6 * 1024 * 1024]),
        ]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(uploader.state().images().len(), 2);
        assert!(uploader.state().error().is_none());
    }

    #[tokio::test]
    async fn partial_failure_is_attributed_per_image() {
        let mut uploader = Uploader::new(FakeTransport::default());
        uploader.drop_files(vec![jpeg("ok-1.jpg", 10), jpeg("fail.jpg", 10), jpeg("ok-2.jpg", 10)]);
        select_all(&mut uploader);

        let reports = uploader.upload().await;
        assert_eq!(reports.len(), 3);

        let state = uploader.state();
        let ids: Vec<_> = state.images().iter().map(|i| i.id).collect();
        assert_eq!(state.image(ids[0]).map(|i| i.status), Some(ImageStatus::Uploaded));
        assert_eq!(state.image(ids[2]).map(|i| i.status), Some(ImageStatus::Uploaded));
        assert_eq!(state.progress(ids[0]), Some(100.0));
        assert_eq!(state.progress(ids[2]), Some(100.0));

        assert_eq!(state.image(ids[1]).map(|i| i.status), Some(ImageStatus::Pending));
        assert_eq!(state.progress(ids[1]), Some(50.0));
        assert_eq!(state.failure(ids[1]), Some("server answered 500 Internal Server Error"));
        assert_eq!(state.error(), Some("Upload failed. Please try again."));
        assert_eq!(state.selection().len(), 3);
    }

    #[tokio::test]
    async fn retry_after_failure_clears_the_attribution() {
        let mut uploader = Uploader::new(FakeTransport::default());
        uploader.drop_files(vec![jpeg("fail.jpg", 4)]);
        select_all(&mut uploader);
        uploader.upload().await;
        let id = uploader.state().id_at(0).expect("id");
        assert!(uploader.state().failure(id).is_some());

        uploader.dispatch(Action::UploadSucceeded(id));
        assert!(uploader.state().failure(id).is_none());
    }

    #[tokio::test]
    async fn only_selected_images_are_sent() {
        let mut uploader = Uploader::new(FakeTransport::default());
        uploader.drop_files(vec![jpeg("a.jpg", 4), jpeg("b.jpg", 4), jpeg("c.jpg", 4)]);
        let b = uploader.state().id_at(1).expect("b");
        uploader.dispatch(Action::ToggleSelect(b));

        uploader.upload().await;

        assert_eq!(*uploader.transport.sent.lock().await, vec!["b.jpg".to_string()]);
        let a = uploader.state().id_at(0).expect("a");
        assert_eq!(uploader.state().progress(a), None);
    }

    #[tokio::test]
    async fn empty_selection_is_a_no_op() {
        let mut uploader = Uploader::new(FakeTransport::default());
        uploader.drop_files(vec![jpeg("a.jpg", 4)]);

        assert!(uploader.upload().await.is_empty());
        assert!(uploader.transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn transfers_run_concurrently() {
        let transport = GatedTransport {
            gate: Arc::new(Barrier::new(3)),
        };
        let mut uploader = Uploader::new(transport);
        uploader.drop_files(vec![jpeg("a.jpg", 1), jpeg("b.jpg", 1), jpeg("c.jpg", 1)]);
        select_all(&mut uploader);

        let reports = uploader.upload().await;
        assert!(reports.iter().all(|r| r.outcome.is_ok()));
    }

    #[test]
    fn bodies_are_split_into_bounded_chunks() {
        let chunks = split_chunks(Bytes::from(vec![0u8; CHUNK_SIZE * 2 + 5]));
        let sizes: Vec<_> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, [CHUNK_SIZE, CHUNK_SIZE, 5]);
        assert!(split_chunks(Bytes::new()).is_empty());
    }

    #[test]
    fn endpoint_is_joined_with_the_upload_route() {
        assert_eq!(
            HttpTransport::new("http://localhost:5000/").url(),
            "http://localhost:5000/api/upload"
        );
    }
}
