//! The in-memory gallery: collections of uploaded images.
//!
//! [`Gallery`] is also the persisted document; its serde shape is the on-disk
//! format of `data.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "servers": [
//!     {
//!       "server": "Alpha",
//!       "slug": "alpha",
//!       "images": [
//!         { "description": "hi", "filename": "20261019T105500.123Z-k3j9x0q2ab-shot.png" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Invariants kept by every mutation:
//!
//! - no collection has an empty `images` list (emptied collections are pruned)
//! - no two collections share a `name`, and no two share a `slug`
//! - collections and images keep insertion order

use crate::slug::unique_slug;
use serde::{Deserialize, Serialize};

/// Current version of the persisted document.
pub const FORMAT_VERSION: u32 = 1;

/// A single uploaded screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub description: String,
    /// Name of the file under `images/` (or `deleted_images/` once removed).
    pub filename: String,
}

/// A named group of images, shown as one section of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Display name, exactly as typed in the upload form.
    #[serde(rename = "server")]
    pub name: String,
    /// Anchor id on the generated page.
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gallery {
    pub version: u32,
    pub servers: Vec<Collection>,
    /// Set by mutations, cleared by the persistence writer once the state
    /// it serialized has been handed off.
    #[serde(skip)]
    dirty: bool,
}

impl Default for Gallery {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            servers: Vec::new(),
            dirty: false,
        }
    }
}

impl Gallery {
    /// Append an image to the collection called `collection_name`, creating
    /// the collection at the end of the list if it doesn't exist yet.
    ///
    /// Returns the collection's slug.
    pub fn add_image(
        &mut self,
        collection_name: &str,
        description: &str,
        filename: &str,
    ) -> String {
        let idx = match self.servers.iter().position(|c| c.name == collection_name) {
            Some(idx) => idx,
            None => {
                let slug = unique_slug(collection_name, |s| self.slug_taken(s));
                self.servers.push(Collection {
                    name: collection_name.to_string(),
                    slug,
                    images: Vec::new(),
                });
                self.servers.len() - 1
            }
        };

        let collection = &mut self.servers[idx];
        collection.images.push(Image {
            description: description.to_string(),
            filename: filename.to_string(),
        });
        self.dirty = true;
        collection.slug.clone()
    }

    /// Remove the first image named `filename`. A collection left without
    /// images is removed as well.
    ///
    /// Returns `false` when no image matched; the gallery is then unchanged.
    pub fn remove_image(&mut self, filename: &str) -> bool {
        let hit = self.servers.iter().enumerate().find_map(|(ci, c)| {
            c.images
                .iter()
                .position(|i| i.filename == filename)
                .map(|ii| (ci, ii))
        });
        let Some((ci, ii)) = hit else {
            return false;
        };

        self.servers[ci].images.remove(ii);
        if self.servers[ci].images.is_empty() {
            self.servers.remove(ci);
        }
        self.dirty = true;
        true
    }

    /// Look up a collection by its exact name.
    pub fn find(&self, name: &str) -> Option<&Collection> {
        self.servers.iter().find(|c| c.name == name)
    }

    pub fn image_count(&self) -> usize {
        self.servers.iter().map(|c| c.images.len()).sum()
    }

    /// Re-establish the invariants on a document that came from disk.
    ///
    /// Older or hand-edited files may contain empty collections, repeated
    /// names, missing slugs, or two collections sharing a slug. Repeated
    /// names are merged into the first occurrence, keeping image order.
    /// Marks the gallery dirty when anything had to change.
    pub fn normalize(&mut self) {
        let before = self.servers.len();
        let mut merged: Vec<Collection> = Vec::with_capacity(before);
        for collection in std::mem::take(&mut self.servers) {
            match merged.iter_mut().find(|c| c.name == collection.name) {
                Some(first) => first.images.extend(collection.images),
                None => merged.push(collection),
            }
        }
        merged.retain(|c| !c.images.is_empty());
        let mut changed = merged.len() != before;
        self.servers = merged;

        let mut assigned: Vec<String> = Vec::with_capacity(self.servers.len());
        for collection in &mut self.servers {
            if collection.slug.is_empty() || assigned.contains(&collection.slug) {
                collection.slug =
                    unique_slug(&collection.name, |s| assigned.iter().any(|a| a == s));
                changed = true;
            }
            assigned.push(collection.slug.clone());
        }

        if self.version != FORMAT_VERSION {
            self.version = FORMAT_VERSION;
            changed = true;
        }
        if changed {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn slug_taken(&self, slug: &str) -> bool {
        self.servers.iter().any(|c| c.slug == slug)
    }
}
