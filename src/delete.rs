//! `POST /api/delete`: soft-delete an uploaded image.
//!
//! The file is moved from `images/` to `deleted_images/`, never erased. The
//! gallery entry is only removed once that move has succeeded, so a failed
//! move never leaves metadata pointing at a missing file.
//!
//! Deleting is idempotent: a filename with no live file, or a moved file no
//! collection references, still answers with the usual redirect.

use crate::server::{ApiError, AppState};
use axum::Form;
use axum::extract::State;
use axum::response::Redirect;
use serde::Deserialize;
use std::io;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub filename: String,
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, ApiError> {
    let filename = form.filename;
    if !is_plain_filename(&filename) {
        return Err(ApiError::InvalidFilename(filename));
    }

    let mut gallery = state.gallery.lock().await;

    let from = state.layout.live_image(&filename);
    let to = state.layout.quarantined_image(&filename);
    match tokio::fs::rename(&from, &to).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(%filename, "no live file to delete");
            return Ok(Redirect::to("/"));
        }
        Err(e) => return Err(e.into()),
    }

    let removed = gallery.remove_image(&filename);
    state.publish(&gallery).await;
    drop(gallery);

    if removed {
        info!(%filename, "moved image to quarantine");
    } else {
        info!(%filename, "quarantined a file no collection referenced");
    }
    Ok(Redirect::to("/"))
}

/// A single, non-special path component.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
