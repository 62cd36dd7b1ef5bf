//! Static site generation.
//!
//! Renders the in-memory [`Gallery`] into `index.html`. The page is built
//! from an index template containing named slots:
//!
//! | Slot | Section |
//! |------|---------|
//! | `{{TITLE}}` | site title from config |
//! | `{{UPLOAD}}` | the upload form, with a datalist of known server names |
//! | `{{SERVER_LIST}}` | `<li>` links to every collection anchor |
//! | `{{SERVERS}}` | one `<section>` per collection with its images |
//!
//! ## Composition, not string replacement
//!
//! The template is parsed once into literal segments and slots
//! ([`Template::parse`]). Each section is rendered on its own with
//! [maud](https://maud.lambda.xyz/) and spliced in during a single pass
//! over the segments. User text that happens to look like `{{SERVERS}}` is
//! therefore never expanded, whichever section it lands in.
//!
//! ## Escaping
//!
//! Every user-supplied value goes through [`escape_html`] via the [`Text`]
//! wrapper, which covers `'` as well as maud's default `& < > "`. The upload
//! form is public, so this is the only thing standing between a description
//! field and stored script injection.
//!
//! Rendering is deterministic: the same gallery and template always produce
//! byte-identical output.

use crate::model::{Collection, Gallery};
use crate::store::write_atomic;
use maud::{Markup, Render, html};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const BUNDLED_TEMPLATE: &str = include_str!("../templates/index.html");

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

fn escape_into(buffer: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => buffer.push_str("&amp;"),
            '<' => buffer.push_str("&lt;"),
            '>' => buffer.push_str("&gt;"),
            '"' => buffer.push_str("&quot;"),
            '\'' => buffer.push_str("&#x27;"),
            _ => buffer.push(c),
        }
    }
}

/// User-supplied text, escaped with [`escape_html`] when rendered.
pub struct Text<'a>(pub &'a str);

impl Render for Text<'_> {
    fn render_to(&self, buffer: &mut String) {
        escape_into(buffer, self.0);
    }
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Title,
    Upload,
    ServerList,
    Servers,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "TITLE" => Some(Self::Title),
            "UPLOAD" => Some(Self::Upload),
            "SERVER_LIST" => Some(Self::ServerList),
            "SERVERS" => Some(Self::Servers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Section),
}

/// An index template split into literal text and section slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Split `source` on `{{NAME}}` tokens. Unknown names, stray `{{` and an
    /// unclosed `{{` are kept as literal text.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                break;
            };
            if after_open[..close].contains("{{") {
                // Stray opener; a later `{{` may still start a slot.
                literal.push_str(&rest[..open + 2]);
                rest = after_open;
                continue;
            }
            literal.push_str(&rest[..open]);
            match Section::from_name(after_open[..close].trim()) {
                Some(section) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(section));
                }
                None => literal.push_str(&rest[open..open + 2 + close + 2]),
            }
            rest = &after_open[close + 2..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn bundled() -> Self {
        Self::parse(BUNDLED_TEMPLATE)
    }

    /// Slots used by this template, in order of first appearance.
    pub fn sections(&self) -> Vec<Section> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if let Segment::Slot(s) = segment
                && !seen.contains(s)
            {
                seen.push(*s);
            }
        }
        seen
    }
}

/// Where the index template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Bundled,
    File(PathBuf),
}

impl TemplateSource {
    pub async fn load(&self) -> Result<Template, GenerateError> {
        match self {
            Self::Bundled => Ok(Template::bundled()),
            Self::File(path) => tokio::fs::read_to_string(path)
                .await
                .map(|source| Template::parse(&source))
                .map_err(|source| GenerateError::Template {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the full index document.
pub fn render(gallery: &Gallery, template: &Template, title: &str) -> String {
    let rendered: HashMap<Section, String> = template
        .sections()
        .into_iter()
        .map(|section| (section, render_section(section, gallery, title).into_string()))
        .collect();

    let mut out = String::new();
    for segment in &template.segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Slot(section) => out.push_str(&rendered[section]),
        }
    }
    out
}

fn render_section(section: Section, gallery: &Gallery, title: &str) -> Markup {
    match section {
        Section::Title => html! { (Text(title)) },
        Section::Upload => upload_form(gallery),
        Section::ServerList => server_list(gallery),
        Section::Servers => html! {
            @for collection in &gallery.servers {
                (collection_section(collection))
            }
        },
    }
}

fn upload_form(gallery: &Gallery) -> Markup {
    html! {
        form.upload-form action="/api/save" method="POST" enctype="multipart/form-data" {
            h2 { "Upload Screenshot" }
            label {
                "Server Name:"
                br;
                input type="text" name="server" list="servers" required;
                datalist id="servers" {
                    @for collection in &gallery.servers {
                        option value=(Text(&collection.name)) {}
                    }
                }
            }
            br;
            label {
                "Description:"
                br;
                textarea name="description" rows="4" cols="50" {}
            }
            br;
            label {
                "Screenshot:"
                br;
                input type="file" name="screenshot" accept="image/*" required;
            }
            br;
            button type="submit" { "Upload" }
        }
    }
}

fn server_list(gallery: &Gallery) -> Markup {
    html! {
        @for collection in &gallery.servers {
            li {
                a href={ "#" (Text(&collection.slug)) } { (Text(&collection.name)) }
            }
        }
    }
}

fn collection_section(collection: &Collection) -> Markup {
    html! {
        section.server id=(Text(&collection.slug)) {
            h2 { (Text(&collection.name)) }
            div.images-container {
                @for image in &collection.images {
                    div.image-entry {
                        a href={ "/images/" (Text(&image.filename)) } {
                            img
                                src={ "/images/" (Text(&image.filename)) }
                                alt=(Text(&image.description))
                                loading="lazy";
                        }
                        p { (Text(&image.description)) }
                        form.delete-form action="/api/delete" method="POST" {
                            input type="hidden" name="filename" value=(Text(&image.filename));
                            button type="submit" { "Delete" }
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// Site writer
// ============================================================================

/// Writes `index.html` from the current gallery.
///
/// Outside live mode the template is loaded once. In live mode it is
/// re-read on every regeneration so edits show up without a restart.
pub struct SiteGenerator {
    source: TemplateSource,
    template: Arc<Template>,
    live: bool,
    title: String,
    index_path: PathBuf,
}

impl SiteGenerator {
    pub async fn new(
        source: TemplateSource,
        live: bool,
        title: impl Into<String>,
        index_path: impl Into<PathBuf>,
    ) -> Result<Self, GenerateError> {
        let template = Arc::new(source.load().await?);
        Ok(Self {
            source,
            template,
            live,
            title: title.into(),
            index_path: index_path.into(),
        })
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Render `gallery` and replace `index.html`.
    pub async fn regenerate(&self, gallery: &Gallery) -> Result<(), GenerateError> {
        let template = if self.live {
            Arc::new(self.source.load().await?)
        } else {
            self.template.clone()
        };
        let html = render(gallery, &template, &self.title);
        write_atomic(&self.index_path, html.as_bytes()).await?;
        tracing::debug!(
            path = %self.index_path.display(),
            collections = gallery.servers.len(),
            "site regenerated"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
