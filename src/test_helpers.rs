//! Shared test utilities for unit tests.
//!
//! Lookup helpers panic with the list of available entries on a miss, so a
//! failing assertion says what the gallery actually contained.

use crate::model::{Collection, Gallery};

/// Three collections, four images, inserted in a known order.
pub fn sample_gallery() -> Gallery {
    let mut gallery = Gallery::default();
    gallery.add_image("Alpha", "spawn area", "1-alpha.png");
    gallery.add_image("Beta", "", "2-beta.png");
    gallery.add_image("Alpha", "castle", "3-alpha.png");
    gallery.add_image("Gamma & Delta", "it's <b>bold</b>", "4-gamma.png");
    gallery
}

/// Find a collection by name. Panics if not found.
pub fn find_collection<'a>(gallery: &'a Gallery, name: &str) -> &'a Collection {
    gallery.find(name).unwrap_or_else(|| {
        let names = collection_names(gallery);
        panic!("collection '{name}' not found. Available: {names:?}")
    })
}

/// All collection names in gallery order.
pub fn collection_names(gallery: &Gallery) -> Vec<&str> {
    gallery.servers.iter().map(|c| c.name.as_str()).collect()
}

/// All collection slugs in gallery order.
pub fn slugs(gallery: &Gallery) -> Vec<&str> {
    gallery.servers.iter().map(|c| c.slug.as_str()).collect()
}

/// Image filenames of a collection in upload order.
pub fn filenames(collection: &Collection) -> Vec<&str> {
    collection
        .images
        .iter()
        .map(|i| i.filename.as_str())
        .collect()
}
