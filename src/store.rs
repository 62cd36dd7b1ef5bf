//! Persistence of the gallery to `data.json`.
//!
//! # Loading
//!
//! [`load`] never fails: a missing file means a fresh gallery, and an
//! unreadable one (bad JSON, unknown version) is logged, renamed aside to
//! `data.json.unreadable-<timestamp>` so the next write cannot clobber it,
//! and replaced by an empty gallery.
//!
//! # Debounced writes
//!
//! Uploads tend to arrive in bursts. Instead of rewriting the file on every
//! mutation, handlers call [`SaveHandle::schedule`], which pokes a single
//! background writer task over a channel:
//!
//! ```text
//! schedule ──▶ ┌────────┐  quiet window elapsed  ┌──────────────┐
//! schedule ──▶ │ writer │ ─────────────────────▶ │ data.json    │
//! schedule ──▶ └────────┘   (one write)          └──────────────┘
//! ```
//!
//! Every message restarts the quiet window; the gallery is serialized only
//! once the window passes without a new message. A crash inside the window
//! loses the unflushed mutations. [`SaveHandle::flush`] bypasses the window
//! and is used on shutdown and in tests.
//!
//! The writer serializes while holding the gallery lock and writes the bytes
//! after releasing it. A failed write restores the dirty flag so the next
//! trigger retries.

use crate::model::{FORMAT_VERSION, Gallery};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persistence task has stopped")]
    Closed,
}

/// Load the gallery from `path`, falling back to an empty one.
pub fn load(path: &Path) -> Gallery {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no existing data file, starting fresh");
            return Gallery::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read data file, starting fresh");
            return Gallery::default();
        }
    };

    match parse(&content) {
        Ok(mut gallery) => {
            gallery.normalize();
            info!(
                collections = gallery.servers.len(),
                images = gallery.image_count(),
                "loaded gallery"
            );
            gallery
        }
        Err(reason) => {
            warn!(path = %path.display(), %reason, "data file is unreadable, starting fresh");
            set_aside(path);
            Gallery::default()
        }
    }
}

fn parse(content: &str) -> Result<Gallery, String> {
    let gallery: Gallery = serde_json::from_str(content).map_err(|e| e.to_string())?;
    if gallery.version != FORMAT_VERSION {
        return Err(format!("unsupported version {}", gallery.version));
    }
    Ok(gallery)
}

/// Move an unreadable data file out of the way so it survives the next save.
fn set_aside(path: &Path) {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let mut target = path.as_os_str().to_owned();
    target.push(format!(".unreadable-{stamp}"));
    let target = PathBuf::from(target);
    match std::fs::rename(path, &target) {
        Ok(()) => warn!(kept_as = %target.display(), "kept unreadable data file"),
        Err(e) => warn!(error = %e, "could not set unreadable data file aside"),
    }
}

/// Serialize `gallery` and write it to `path` atomically.
pub async fn save(path: &Path, gallery: &Gallery) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(gallery)?;
    write_atomic(path, &json).await?;
    Ok(())
}

/// Write through a sibling temp file and rename, so readers never see a
/// truncated file.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

enum SaveCommand {
    Schedule,
    Flush(oneshot::Sender<Result<(), StoreError>>),
}

/// Cheap, cloneable handle to the writer task.
#[derive(Clone)]
pub struct SaveHandle {
    tx: mpsc::UnboundedSender<SaveCommand>,
    writes: Arc<AtomicU64>,
}

impl SaveHandle {
    /// Request a write once the quiet window has passed without further
    /// requests.
    pub fn schedule(&self) {
        if self.tx.send(SaveCommand::Schedule).is_err() {
            warn!("persistence task has stopped, change will not be saved");
        }
    }

    /// Write pending changes now and wait for the outcome.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(SaveCommand::Flush(ack))
            .map_err(|_| StoreError::Closed)?;
        done.await.map_err(|_| StoreError::Closed)?
    }

    /// Number of successful writes since the task started.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Owner of the debounce window and the data file.
pub struct Persister {
    path: PathBuf,
    gallery: Arc<Mutex<Gallery>>,
    window: Duration,
    writes: Arc<AtomicU64>,
}

impl Persister {
    pub fn new(path: PathBuf, gallery: Arc<Mutex<Gallery>>, window: Duration) -> Self {
        Self {
            path,
            gallery,
            window,
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the writer task. It runs until every [`SaveHandle`] is dropped,
    /// writing pending state one last time on the way out.
    pub fn spawn(self) -> (SaveHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SaveHandle {
            tx,
            writes: self.writes.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<SaveCommand>) {
        // Idle: nothing pending until the first message.
        while let Some(cmd) = rx.recv().await {
            if let SaveCommand::Flush(ack) = cmd {
                let _ = ack.send(self.write_if_dirty().await);
                continue;
            }

            // Pending: every message restarts the quiet window.
            loop {
                match tokio::time::timeout(self.window, rx.recv()).await {
                    Ok(Some(SaveCommand::Schedule)) => {
                        debug!("save rescheduled");
                    }
                    Ok(Some(SaveCommand::Flush(ack))) => {
                        let _ = ack.send(self.write_if_dirty().await);
                        break;
                    }
                    Ok(None) => {
                        let _ = self.write_if_dirty().await;
                        return;
                    }
                    Err(_elapsed) => {
                        let _ = self.write_if_dirty().await;
                        break;
                    }
                }
            }
        }
        debug!("persistence task finished");
    }

    async fn write_if_dirty(&self) -> Result<(), StoreError> {
        let json = {
            let mut gallery = self.gallery.lock().await;
            if !gallery.is_dirty() {
                return Ok(());
            }
            let json = serde_json::to_vec_pretty(&*gallery)?;
            gallery.clear_dirty();
            json
        };

        if let Err(e) = write_atomic(&self.path, &json).await {
            error!(
                path = %self.path.display(),
                error = %e,
                "failed to write data file, will retry on next change"
            );
            self.gallery.lock().await.mark_dirty();
            return Err(e.into());
        }

        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(path = %self.path.display(), bytes = json.len(), "data file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_millis(1000);

    fn spawn_persister(path: &Path) -> (Arc<Mutex<Gallery>>, SaveHandle, JoinHandle<()>) {
        let gallery = Arc::new(Mutex::new(Gallery::default()));
        let (handle, task) = Persister::new(path.to_path_buf(), gallery.clone(), WINDOW).spawn();
        (gallery, handle, task)
    }

    #[test]
    fn load_missing_file_gives_empty_gallery() {
        let tmp = TempDir::new().unwrap();
        let gallery = load(&tmp.path().join("data.json"));
        assert!(gallery.servers.is_empty());
        assert_eq!(gallery.version, FORMAT_VERSION);
    }

    #[test]
    fn load_malformed_file_gives_empty_gallery_and_keeps_original() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let gallery = load(&path);

        assert!(gallery.servers.is_empty());
        assert!(!path.exists());
        let kept: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].starts_with("data.json.unreadable-"));
    }

    #[test]
    fn load_unknown_version_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, r#"{ "version": 99, "servers": [] }"#).unwrap();

        assert!(load(&path).servers.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn save_then_load_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        let gallery = sample_gallery();

        save(&path, &gallery).await.unwrap();
        let loaded = load(&path);

        assert_eq!(loaded.servers, gallery.servers);
        assert!(!loaded.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_schedules_produces_one_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        let (gallery, handle, _task) = spawn_persister(&path);

        for i in 0..5 {
            gallery
                .lock()
                .await
                .add_image("Alpha", "", &format!("{i}.png"));
            handle.schedule();
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(handle.writes(), 0, "wrote inside the quiet window");
        }

        tokio::time::sleep(Duration::from_millis(1500)).await;
        // A flush after the window has nothing left to write.
        handle.flush().await.unwrap();

        assert_eq!(handle.writes(), 1);
        let written = load(&path);
        assert_eq!(filenames(find_collection(&written, "Alpha")).len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        let (gallery, handle, _task) = spawn_persister(&path);

        gallery.lock().await.add_image("Alpha", "hi", "a.png");
        handle.schedule();
        handle.flush().await.unwrap();

        assert_eq!(handle.writes(), 1);
        assert!(load(&path).find("Alpha").is_some());
        assert!(!gallery.lock().await.is_dirty());
    }

    #[tokio::test]
    async fn flush_without_changes_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        let (_gallery, handle, _task) = spawn_persister(&path);

        handle.flush().await.unwrap();

        assert_eq!(handle.writes(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_write_keeps_gallery_dirty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing-dir").join("data.json");
        let (gallery, handle, _task) = spawn_persister(&path);

        gallery.lock().await.add_image("Alpha", "", "a.png");
        assert!(handle.flush().await.is_err());
        assert!(gallery.lock().await.is_dirty());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        handle.flush().await.unwrap();
        assert_eq!(handle.writes(), 1);
    }

    #[tokio::test]
    async fn dropping_handles_writes_pending_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        let (gallery, handle, task) = spawn_persister(&path);

        gallery.lock().await.add_image("Alpha", "", "a.png");
        handle.schedule();
        drop(handle);
        task.await.unwrap();

        assert!(load(&path).find("Alpha").is_some());
    }
}
