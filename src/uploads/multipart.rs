//! Multipart form data handling
//!
//! Forms are generated from [`MultipartPart`] descriptors every time a request is
//! dispatched, so a replayed request re-opens its files instead of reusing a
//! drained body stream.

use reqwest::multipart::{Form, Part};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::errors::{PulseError, Result};
use crate::models::{MultipartPart, MultipartValue};

/// Maximum file size to load into memory (10MB)
/// Files larger than this will be streamed
const MAX_MEMORY_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Build a multipart form from part descriptors, in order
pub fn build_multipart_form(parts: &[MultipartPart]) -> Result<Form> {
    let mut form = Form::new();

    for part in parts {
        form = match &part.value {
            MultipartValue::Text(value) => form.text(part.name.clone(), value.clone()),
            MultipartValue::File { path, filename, content_type } => {
                let file_part = create_file_part(path, filename.as_deref(), content_type.as_deref())?;
                form.part(part.name.clone(), file_part)
            }
        };
    }

    Ok(form)
}

/// Build the form on the blocking pool; file reads are synchronous
pub async fn build_multipart_form_async(parts: Vec<MultipartPart>) -> Result<Form> {
    tokio::task::spawn_blocking(move || build_multipart_form(&parts))
        .await
        .map_err(|e| PulseError::Io(std::io::Error::other(format!("Multipart form task failed: {}", e))))?
}

/// Create a multipart Part for a file
/// Uses streaming for large files to prevent memory exhaustion
fn create_file_part(path: &Path, filename: Option<&str>, content_type: Option<&str>) -> Result<Part> {
    let file_size = std::fs::metadata(path)?.len();

    let filename = filename
        .map(str::to_string)
        .or_else(|| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .unwrap_or_else(|| "file".to_string());

    let mime_type = match content_type {
        Some(content_type) => content_type.to_string(),
        None => mime_guess::from_path(path).first_or_octet_stream().to_string(),
    };

    let part = if file_size <= MAX_MEMORY_FILE_SIZE {
        let mut file = File::open(path)?;
        let mut contents = Vec::with_capacity(file_size as usize);
        file.read_to_end(&mut contents)?;
        Part::bytes(contents).file_name(filename)
    } else {
        let file = File::open(path)?;
        let async_file = tokio::fs::File::from_std(file);
        let stream = FramedRead::new(async_file, BytesCodec::new());
        let body = reqwest::Body::wrap_stream(stream);
        Part::stream_with_length(body, file_size).file_name(filename)
    };

    part.mime_str(&mime_type)
        .map_err(|e| PulseError::Validation(format!("Invalid MIME type '{}': {}", mime_type, e)))
}
