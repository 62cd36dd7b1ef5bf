//! Shared setup for the HTTP-level tests.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use axum::Router;
use servershots::config::ServerConfig;
use servershots::layout::Layout;
use servershots::server::{self, AppState};
use tempfile::TempDir;
use tower::ServiceExt as _;

pub const BOUNDARY: &str = "XxServershotsTestBoundaryxX";

/// A running gallery rooted in a temp directory.
#[allow(dead_code, reason = "not every test file uses every field")]
pub struct TestApp {
    pub dir: TempDir,
    pub layout: Layout,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self::open(dir).await
    }

    /// Start (or restart) a gallery over an existing directory.
    pub async fn open(dir: TempDir) -> Self {
        let layout = Layout::new(dir.path().join("out"));
        let (state, _task) = AppState::open(layout.clone(), &ServerConfig::default())
            .await
            .unwrap();
        let router = server::router(state.clone());
        Self {
            dir,
            layout,
            state,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn upload(&self, parts: &[Part<'_>]) -> Response<Body> {
        let request = Request::post("/api/save")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, encoded_filename: &str) -> Response<Body> {
        let request = Request::post("/api/delete")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("filename={encoded_filename}")))
            .unwrap();
        self.send(request).await
    }

    pub fn index_html(&self) -> String {
        std::fs::read_to_string(&self.layout.index_file).unwrap()
    }

    /// Filenames in `images/`, sorted.
    pub fn live_files(&self) -> Vec<String> {
        list_dir(&self.layout.images_dir)
    }

    /// Filenames in `deleted_images/`, sorted.
    pub fn quarantined_files(&self) -> Vec<String> {
        list_dir(&self.layout.deleted_dir)
    }

    /// Filenames of a collection, in gallery order.
    pub async fn filenames_of(&self, name: &str) -> Vec<String> {
        let gallery = self.state.gallery.lock().await;
        gallery
            .find(name)
            .map(|c| c.images.iter().map(|i| i.filename.clone()).collect())
            .unwrap_or_default()
    }
}

fn list_dir(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content: &'a [u8],
    },
}

/// The three fields the upload form sends, in form order.
pub fn screenshot<'a>(server: &'a str, description: &'a str, content: &'a [u8]) -> Vec<Part<'a>> {
    vec![
        Part::Text("server", server),
        Part::Text("description", description),
        Part::File {
            name: "screenshot",
            filename: "shot.png",
            content,
        },
    ]
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content,
            } => {
                let headers = format!(
                    "Content-Disposition: form-data; name=\"{name}\"; \
                     filename=\"{filename}\"\r\n\
                     Content-Type: image/png\r\n\r\n"
                );
                body.extend_from_slice(headers.as_bytes());
                body.extend_from_slice(content);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn location(response: &Response<Body>) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
