use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use image_uploader::client::{
    dropzone::mime_from_name, Action, CropRect, HttpTransport, ImageId, ImageStatus, SourceFile,
    Uploader, UploaderState,
};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "image-upload", about = "Select up to five images and upload them")]
struct Args {
    /// Base URL of the upload receiver.
    #[arg(long, default_value = "http://localhost:5000")]
    endpoint: String,
    /// Positions (0-based) of the images to upload; all accepted files when omitted.
    #[arg(long = "select", value_delimiter = ',')]
    select: Vec<usize>,
    /// Crop rectangle `X,Y,W,H` applied to the first image as a preview.
    #[arg(long, value_parser = parse_rect)]
    crop: Option<CropRect>,
    /// Where the crop preview PNG is written.
    #[arg(long, requires = "crop")]
    crop_out: Option<PathBuf>,
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn parse_rect(raw: &str) -> Result<CropRect, String> {
    let parts: Vec<u32> = raw
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop rectangle {raw:?}: {e}"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(CropRect::new(*x, *y, *w, *h)),
        _ => Err(format!("crop rectangle needs four values, got {raw:?}")),
    }
}

/// Maps `--select` positions to image ids. Repeated positions count once;
/// a position with no image behind it is an error.
fn resolve_selection(state: &UploaderState, positions: &[usize]) -> Result<Vec<ImageId>, String> {
    if positions.is_empty() {
        return Ok(state.images().iter().map(|img| img.id).collect());
    }

    let mut ids = Vec::with_capacity(positions.len());
    for pos in positions {
        let id = state.id_at(*pos).ok_or_else(|| {
            format!(
                "no image at position {} ({} accepted)",
                pos,
                state.images().len()
            )
        })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// One line per selected image plus whether any of them did not make it.
fn summarize(state: &UploaderState) -> (Vec<String>, bool) {
    let mut lines = Vec::new();
    let mut failed = false;
    for image in state.images().iter().filter(|img| state.is_selected(img.id)) {
        let line = match (image.status, state.failure(image.id)) {
            (ImageStatus::Uploaded, _) => {
                format!("{} ({} MB): Upload success!", image.file.name, image.size_label())
            }
            (ImageStatus::Pending, reason) => {
                failed = true;
                format!(
                    "{} ({} MB): {}",
                    image.file.name,
                    image.size_label(),
                    reason.unwrap_or("not uploaded")
                )
            }
        };
        lines.push(line);
    }
    (lines, failed)
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn read_files(paths: &[PathBuf]) -> std::io::Result<Vec<SourceFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_from_name(&name);
        files.push(SourceFile::new(name, mime, bytes));
    }
    Ok(files)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let files = match read_files(&args.files).await {
        Ok(files) => files,
        Err(err) => {
            error!(error = %err, "failed to read input files");
            return ExitCode::FAILURE;
        }
    };

    let mut uploader = Uploader::new(HttpTransport::new(&args.endpoint));
    for rejected in uploader.drop_files(files) {
        println!("skipped {}: {:?}", rejected.file.name, rejected.reasons);
    }
    if let Some(message) = uploader.state().error() {
        println!("{}", message);
        return ExitCode::FAILURE;
    }

    let ids = match resolve_selection(uploader.state(), &args.select) {
        Ok(ids) if ids.is_empty() => {
            println!("nothing to upload");
            return ExitCode::FAILURE;
        }
        Ok(ids) => ids,
        Err(message) => {
            println!("{}", message);
            return ExitCode::FAILURE;
        }
    };
    for id in ids {
        uploader.dispatch(Action::ToggleSelect(id));
    }

    if let (Some(rect), Some(first)) = (args.crop, uploader.state().id_at(0)) {
        uploader.dispatch(Action::BeginCrop(first));
        uploader.dispatch(Action::SetAspect(None));
        let state = uploader.dispatch(Action::SetCrop(rect));
        match (state.crop().and_then(|c| c.result.as_ref()), &args.crop_out) {
            (Some(result), Some(out)) => {
                if let Err(err) = tokio::fs::write(out, &result.png).await {
                    error!(error = %err, path = %out.display(), "failed to write crop preview");
                } else {
                    println!(
                        "crop preview {}x{} written to {}",
                        result.width,
                        result.height,
                        out.display()
                    );
                }
            }
            (Some(result), None) => println!("crop preview {}x{}", result.width, result.height),
            (None, _) => println!("{}", state.error().unwrap_or("crop failed")),
        }
        uploader.dispatch(Action::EndCrop);
    }

    uploader.upload().await;

    let state = uploader.state();
    let (lines, failed) = summarize(state);
    for line in lines {
        println!("{}", line);
    }
    if let Some(message) = state.error() {
        println!("{}", message);
    }

    exit_code(failed)
}
