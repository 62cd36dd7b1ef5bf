//! HTTP surface: shared state, routing and request errors.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/save` | [`upload::save_handler`](crate::upload::save_handler) |
//! | POST | `/api/delete` | [`delete::delete_handler`](crate::delete::delete_handler) |
//! | GET | anything else | [`static_files`](crate::static_files) |
//!
//! All state lives in one [`AppState`] built at startup and handed to every
//! handler. The gallery sits behind a single async mutex; a handler holds it
//! for the mutation and the regeneration that follows, so two mutations
//! never interleave and the rendered page always matches some complete
//! state.

use crate::config::ServerConfig;
use crate::generate::{GenerateError, SiteGenerator, TemplateSource};
use crate::layout::Layout;
use crate::model::Gallery;
use crate::store::{self, Persister, SaveHandle};
use crate::{delete, static_files, upload};
use axum::extract::DefaultBodyLimit;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub gallery: Arc<Mutex<Gallery>>,
    pub site: Arc<SiteGenerator>,
    pub saver: SaveHandle,
    pub layout: Arc<Layout>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Prepare the output root, load the gallery, render the site once and
    /// start the persistence writer.
    ///
    /// The returned task ends after every clone of the state is dropped.
    pub async fn open(
        layout: Layout,
        config: &ServerConfig,
    ) -> Result<(Self, JoinHandle<()>), ServerError> {
        layout.prepare()?;
        let gallery = store::load(&layout.data_file);

        let source = match &config.template {
            Some(path) => TemplateSource::File(path.clone()),
            None => TemplateSource::Bundled,
        };
        let site = SiteGenerator::new(
            source,
            config.live,
            config.site_title.clone(),
            layout.index_file.clone(),
        )
        .await?;
        site.regenerate(&gallery).await?;

        let repaired = gallery.is_dirty();
        let gallery = Arc::new(Mutex::new(gallery));
        let (saver, task) = Persister::new(
            layout.data_file.clone(),
            gallery.clone(),
            config.save_window(),
        )
        .spawn();
        if repaired {
            saver.schedule();
        }

        info!(root = %layout.root.display(), live = config.live, "gallery ready");
        Ok((
            Self {
                gallery,
                site: Arc::new(site),
                saver,
                layout: Arc::new(layout),
                max_upload_bytes: config.max_upload_bytes(),
            },
            task,
        ))
    }

    /// Regenerate the site from `gallery` and schedule a save.
    ///
    /// Callers pass the gallery they are still holding the lock on. A failed
    /// regeneration is logged rather than returned: the mutation already
    /// happened and will be persisted, and the next regeneration repairs
    /// the page.
    pub async fn publish(&self, gallery: &Gallery) {
        if let Err(e) = self.site.regenerate(gallery).await {
            error!(error = %e, "failed to regenerate site");
        }
        self.saver.schedule();
    }
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route(
            "/api/save",
            post(upload::save_handler).layer(DefaultBodyLimit::max(limit)),
        )
        .route("/api/delete", post(delete::delete_handler))
        .fallback(static_files::serve)
        .with_state(state)
}

/// Why a mutating request was refused.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` must come before the file")]
    FieldAfterFile(&'static str),
    #[error("more than one file in upload")]
    ExtraFile,
    #[error("invalid filename `{0}`")]
    InvalidFilename(String),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::FieldAfterFile(_)
            | Self::ExtraFile
            | Self::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
