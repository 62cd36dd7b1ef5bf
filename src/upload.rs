//! `POST /api/save`: accept a screenshot upload.
//!
//! The multipart body carries three fields:
//!
//! - `server`: collection name (required, non-blank, must precede the file
//!   and may not be repeated after it)
//! - `description`: free text (optional, anywhere in the body)
//! - `screenshot`: the file itself (required, exactly one)
//!
//! The file is streamed chunk by chunk into `images/` under a freshly
//! generated name, so nothing is buffered beyond one chunk. Metadata is
//! checked before the file part is accepted: a request without a usable
//! `server` value is refused before a single byte hits the disk. Once the
//! body is fully read the gallery is updated, the site regenerated, a save
//! scheduled, and the client redirected to `/#<slug>`.
//!
//! Any failure after the file was created removes it again, so rejected
//! requests leave neither metadata nor orphan files behind.

use crate::server::{ApiError, AppState};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::response::Redirect;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const TOKEN_LEN: usize = 10;

pub async fn save_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let upload = read_upload(multipart, &state.layout.images_dir).await?;

    let slug = {
        let mut gallery = state.gallery.lock().await;
        let slug = gallery.add_image(&upload.server, &upload.description, &upload.filename);
        state.publish(&gallery).await;
        slug
    };

    info!(
        server = %upload.server,
        filename = %upload.filename,
        bytes = upload.bytes,
        "saved upload"
    );
    Ok(Redirect::to(&format!("/#{slug}")))
}

/// A fully received upload whose file is already on disk.
#[derive(Debug)]
struct Upload {
    server: String,
    description: String,
    filename: String,
    bytes: u64,
}

#[derive(Default)]
struct PartialUpload {
    server: Option<String>,
    description: String,
    stored: Option<(String, PathBuf, u64)>,
}

async fn read_upload(multipart: Multipart, images_dir: &Path) -> Result<Upload, ApiError> {
    let mut partial = PartialUpload::default();
    let result = read_fields(multipart, images_dir, &mut partial).await;

    if let Err(e) = result {
        if let Some((_, path, _)) = &partial.stored {
            discard(path).await;
        }
        return Err(e);
    }

    let Some((filename, _, bytes)) = partial.stored else {
        return Err(ApiError::MissingField("screenshot"));
    };
    let Some(server) = partial.server else {
        return Err(ApiError::MissingField("server"));
    };
    Ok(Upload {
        server,
        description: partial.description,
        filename,
        bytes,
    })
}

async fn read_fields(
    mut multipart: Multipart,
    images_dir: &Path,
    partial: &mut PartialUpload,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("server") => {
                if partial.stored.is_some() {
                    return Err(ApiError::FieldAfterFile("server"));
                }
                partial.server = Some(field.text().await?);
            }
            Some("description") => partial.description = field.text().await?,
            Some("screenshot") => {
                if partial.stored.is_some() {
                    return Err(ApiError::ExtraFile);
                }
                if partial.server.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    return Err(ApiError::MissingField("server"));
                }
                let original = field.file_name().unwrap_or_default().to_owned();
                if original.is_empty() {
                    // Browsers send an empty, unnamed part when no file is chosen.
                    return Err(ApiError::MissingField("screenshot"));
                }
                let (filename, path, file) = create_unique(images_dir, &original).await?;
                partial.stored = Some((filename, path, 0));
                let written = stream_to(field, file).await?;
                if let Some((_, _, bytes)) = partial.stored.as_mut() {
                    *bytes = written;
                }
            }
            other => debug!(field = ?other, "ignoring unknown upload field"),
        }
    }
    Ok(())
}

async fn stream_to(mut field: Field<'_>, mut file: File) -> Result<u64, ApiError> {
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Create a new file under `dir` named after `original`, never reusing an
/// existing name.
async fn create_unique(dir: &Path, original: &str) -> io::Result<(String, PathBuf, File)> {
    loop {
        let filename = generate_filename(original);
        let path = dir.join(&filename);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((filename, path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!(%filename, "generated filename already exists, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "could not remove partial upload");
    }
}

/// `<timestamp>-<token>-<sanitized original name>`, e.g.
/// `20261019T105500.123Z-k3j9x0q2ab-my_shot.png`.
pub fn generate_filename(original: &str) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{stamp}-{token}-{}", sanitize_filename(original))
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Keeps the last component of either path separator style and replaces
/// every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_filename("shot-01.png"), "shot-01.png");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\Users\me\shot.png"), "shot.png");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my shot (1)<x>.png"), "my_shot__1__x_.png");
        assert_eq!(sanitize_filename("bildschirmfoto-ä.png"), "bildschirmfoto-_.png");
    }

    #[test]
    fn sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn generated_names_have_three_parts() {
        let name = generate_filename("shot.png");
        let parts: Vec<&str> = name.splitn(3, '-').collect();

        assert_eq!(parts.len(), 3);
        assert!(parts[0].ends_with('Z'));
        assert_eq!(parts[1].len(), TOKEN_LEN);
        assert!(parts[1].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(parts[2], "shot.png");
    }

    #[test]
    fn generated_names_are_unique() {
        let names: std::collections::HashSet<String> =
            (0..200).map(|_| generate_filename("a.png")).collect();
        assert_eq!(names.len(), 200);
    }

    #[tokio::test]
    async fn create_unique_never_overwrites() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (first, path, _) = create_unique(tmp.path(), "a.png").await.unwrap();
        let (second, _, _) = create_unique(tmp.path(), "a.png").await.unwrap();

        assert_ne!(first, second);
        assert!(path.exists());
    }
}
