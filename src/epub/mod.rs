pub mod navigation;
pub mod opf;
pub mod writer;

use serde::{Deserialize, Serialize};

/// Directory inside the archive holding the package document and content.
pub const OPF_DIR: &str = "OEBPS";

/// Package-level metadata rendered into `content.opf`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub identifier: String,
    pub title: String,
    pub sort_title: Option<String>,
    pub language: String,
    pub creators: Vec<Person>,
    pub subjects: Vec<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
    pub isbn: Option<String>,
    pub series: Option<Series>,
    /// Href (relative to the content directory) of the cover image.
    pub cover_href: Option<String>,
    pub modified: Option<String>,
}

/// A creator with an optional sort key (`file-as`).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub file_as: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub index: Option<String>,
}

/// An item in the EPUB manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// A spine item reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

/// One heading destined for the navigation tree.
///
/// Entries arrive flat in document order; `depth` (1 at the top) is the only
/// nesting information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavEntry {
    pub id: Option<String>,
    pub order: u32,
    pub title: String,
    pub href: String,
    pub depth: u32,
}

impl NavEntry {
    /// Title collapsed to a single line for display.
    pub fn label(&self) -> String {
        self.title.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
