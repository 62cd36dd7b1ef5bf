//! On-disk layout of the output root.
//!
//! ```text
//! out/
//! ├── index.html          # Generated site
//! ├── style.css           # Installed asset (see `assets`)
//! ├── data.json           # Persisted gallery
//! ├── images/             # Live uploads, served at /images/<filename>
//! └── deleted_images/     # Quarantine for deleted uploads
//! ```

use std::io;
use std::path::{Path, PathBuf};

pub const IMAGES_DIR: &str = "images";
pub const DELETED_IMAGES_DIR: &str = "deleted_images";
pub const DATA_FILE: &str = "data.json";
pub const INDEX_FILE: &str = "index.html";

/// Entries of the output root owned by the server itself. Static assets
/// with these names are never installed over them.
pub const RESERVED_NAMES: [&str; 4] = [IMAGES_DIR, DELETED_IMAGES_DIR, DATA_FILE, INDEX_FILE];

/// Whether a path relative to the output root belongs to server state that
/// is never served: the quarantine directory, the data file and its
/// temporary or set-aside siblings.
pub fn is_private(relative: &Path) -> bool {
    let Some(first) = relative.components().next() else {
        return false;
    };
    let first = first.as_os_str().to_string_lossy();
    first == DELETED_IMAGES_DIR || first.starts_with(DATA_FILE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub deleted_dir: PathBuf,
    pub data_file: PathBuf,
    pub index_file: PathBuf,
}

impl Layout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            images_dir: root.join(IMAGES_DIR),
            deleted_dir: root.join(DELETED_IMAGES_DIR),
            data_file: root.join(DATA_FILE),
            index_file: root.join(INDEX_FILE),
            root,
        }
    }

    /// Create the output root and both image directories.
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.images_dir)?;
        std::fs::create_dir_all(&self.deleted_dir)?;
        Ok(())
    }

    pub fn live_image(&self, filename: &str) -> PathBuf {
        self.images_dir.join(filename)
    }

    pub fn quarantined_image(&self, filename: &str) -> PathBuf {
        self.deleted_dir.join(filename)
    }
}
