//! # servershots
//!
//! A self-hosted screenshot gallery. Visitors upload screenshots tagged with
//! the server (or any named collection) they belong to; the service keeps the
//! gallery in memory, publishes it as a plain static `index.html`, and serves
//! that page next to the uploaded images.
//!
//! # Architecture
//!
//! ```text
//! POST /api/save ─┐                         ┌─▶ index.html   (generate)
//!                 ├─▶ Gallery mutation ─────┤
//! POST /api/delete┘   (model, one mutex)    └─▶ data.json    (store, debounced)
//!
//! GET /anything ───▶ output root on disk    (static_files)
//! ```
//!
//! Every mutation regenerates the page from the in-memory model, then asks
//! the persistence writer to save. The writer coalesces bursts: a batch of
//! uploads inside the quiet window results in one write of `data.json`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | `Gallery` / `Collection` / `Image`, find-or-create and removal |
//! | [`slug`] | Anchor slugs for collection names, with collision suffixes |
//! | [`store`] | Loading `data.json`, atomic writes, the debounced writer task |
//! | [`generate`] | Template slots, section rendering with maud, HTML escaping |
//! | [`upload`] | `POST /api/save`: streams the file, records the image |
//! | [`delete`] | `POST /api/delete`: moves the file to quarantine, drops the image |
//! | [`server`] | Shared `AppState`, router, request errors |
//! | [`static_files`] | Serving the output root |
//! | [`assets`] | Installing stylesheet and other static assets at startup |
//! | [`layout`] | Paths inside the output root |
//! | [`config`] | TOML config with stock defaults and validation |
//!
//! # Design Decisions
//!
//! ## Soft Deletes
//!
//! Deleting never erases a file. It is moved to `deleted_images/` first, and
//! only a successful move removes the gallery entry, so an accidental or
//! malicious delete can always be undone by moving the file back and
//! re-uploading the metadata.
//!
//! ## Static Output
//!
//! The published page is a plain file. Reads never touch the model (outside
//! live mode), and the output directory can be served by any other web
//! server if the upload endpoints aren't needed.

pub mod assets;
pub mod config;
pub mod delete;
pub mod generate;
pub mod layout;
pub mod model;
pub mod server;
pub mod slug;
pub mod static_files;
pub mod store;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
