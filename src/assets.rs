//! Installation of static assets into the output root.
//!
//! With a configured `static_dir`, each top-level entry replaces its
//! counterpart in the output root: copied recursively normally, symlinked in
//! live mode so stylesheet edits show up immediately. Without one, the
//! bundled `style.css` is written.
//!
//! Entries named like server-owned files (`images`, `data.json`, …) are
//! skipped.

use crate::layout::RESERVED_NAMES;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

const BUNDLED_CSS: &str = include_str!("../static/style.css");

/// Install assets into `out_dir`. Returns the number of top-level entries
/// installed.
pub fn install(static_dir: Option<&Path>, out_dir: &Path, live: bool) -> io::Result<usize> {
    let Some(static_dir) = static_dir else {
        fs::write(out_dir.join("style.css"), BUNDLED_CSS)?;
        return Ok(1);
    };

    let mut installed = 0;
    for entry in fs::read_dir(static_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if RESERVED_NAMES.iter().any(|r| name == *r) {
            warn!(name = %name.to_string_lossy(), "skipping static asset that shadows server data");
            continue;
        }

        let target = out_dir.join(&name);
        remove_existing(&target)?;
        if live {
            link(&entry.path(), &target)?;
        } else {
            copy_recursive(&entry.path(), &target)?;
        }
        installed += 1;
    }
    info!(
        from = %static_dir.display(),
        count = installed,
        mode = if live { "symlink" } else { "copy" },
        "installed static assets"
    );
    Ok(installed)
}

fn remove_existing(target: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(target) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    }
}

#[cfg(unix)]
fn link(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::canonicalize(src)?, dst)
}

#[cfg(not(unix))]
fn link(src: &Path, dst: &Path) -> io::Result<()> {
    copy_recursive(src, dst)
}

fn copy_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_file() {
        fs::copy(src, dst)?;
        return Ok(());
    }
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let dst_path = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dst_path)?;
        } else {
            fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}
