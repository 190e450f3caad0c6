//! Book metadata: catalog records, the FB2 `<description>` harvest, and the
//! merge of both into package metadata.

use crate::epub::{PackageMetadata, Person, Series};
use crate::error::{LookupError, Result};
use crate::fb2::attr;
use quick_xml::events::BytesStart;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Book record as supplied by the external catalog.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookRecord {
    pub title: String,
    pub sort_title: Option<String>,
    pub plot: Option<String>,
    pub cover_id: Option<String>,
    pub language: Option<String>,
    pub authors: Vec<Author>,
    pub genres: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub sort: Option<String>,
}

/// Lookup capability of the book catalog.
pub trait Catalog {
    fn book_metadata(&self, id: &str) -> std::result::Result<BookRecord, LookupError>;
}

/// Catalog backed by a JSON object mapping book ids to records.
#[derive(Debug, Default, Clone)]
pub struct JsonCatalog {
    records: HashMap<String, BookRecord>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: HashMap<String, BookRecord> = serde_json::from_str(&content)?;
        Ok(Self { records })
    }

    pub fn from_records(records: HashMap<String, BookRecord>) -> Self {
        Self { records }
    }
}

impl Catalog for JsonCatalog {
    fn book_metadata(&self, id: &str) -> std::result::Result<BookRecord, LookupError> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::UnknownBook(id.to_string()))
    }
}

/// An author as written in `title-info`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceAuthor {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
}

impl SourceAuthor {
    fn is_empty(&self) -> bool {
        self.display_name().is_empty()
    }

    /// `First Middle Last`, or the nickname when no name parts are given.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            self.nickname.clone().unwrap_or_default()
        } else {
            parts.join(" ")
        }
    }

    /// `Last, First Middle`.
    pub fn sort_name(&self) -> Option<String> {
        let last = self.last_name.as_deref()?;
        let rest: Vec<&str> = [&self.first_name, &self.middle_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if rest.is_empty() {
            Some(last.to_string())
        } else {
            Some(format!("{last}, {}", rest.join(" ")))
        }
    }
}

/// Metadata collected while streaming `<description>`.
///
/// Fed with events for elements strictly inside `<description>`. Only the
/// first `title-info` counts; `src-title-info` (the original-language
/// record of a translation) is ignored.
#[derive(Debug, Default, Clone)]
pub struct DescriptionHarvest {
    pub title: Option<String>,
    pub language: Option<String>,
    pub authors: Vec<SourceAuthor>,
    pub genres: Vec<String>,
    pub annotation: Option<String>,
    pub keywords: Vec<String>,
    pub date: Option<String>,
    pub cover_href: Option<String>,
    pub sequence: Option<Series>,
    pub document_id: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<String>,
    pub isbn: Option<String>,
    path: Vec<String>,
    text: String,
    author: SourceAuthor,
    annotation_text: String,
    title_infos: u32,
}

impl DescriptionHarvest {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_title_info(&self) -> bool {
        self.title_infos == 1 && self.path.first().is_some_and(|p| p == "title-info")
    }

    pub fn start(&mut self, name: &str, e: &BytesStart) {
        self.path.push(name.to_string());
        self.text.clear();
        if self.path.len() == 1 && name == "title-info" {
            self.title_infos += 1;
        }
        if !self.in_title_info() {
            return;
        }
        match (self.path.len(), name) {
            (2, "author") => self.author = SourceAuthor::default(),
            (2, "sequence") if self.sequence.is_none() => {
                if let Some(series) = attr(e, "name").filter(|n| !n.trim().is_empty()) {
                    self.sequence = Some(Series {
                        name: series.trim().to_string(),
                        index: attr(e, "number").filter(|n| !n.trim().is_empty()),
                    });
                }
            }
            (3, "image") if self.path[1] == "coverpage" && self.cover_href.is_none() => {
                self.cover_href = attr(e, "href");
            }
            _ => {}
        }
    }

    /// Unescaped character data.
    pub fn text(&mut self, text: &str) {
        self.text.push_str(text);
        if self.in_title_info() && self.path.get(1).is_some_and(|p| p == "annotation") {
            self.annotation_text.push_str(text);
        }
    }

    pub fn end(&mut self, name: &str) {
        let value = non_empty(&self.text);
        let path: Vec<&str> = self.path.iter().map(|s| s.as_str()).collect();
        match path.as_slice() {
            ["title-info", "book-title"] if self.in_title_info() => self.title = value,
            ["title-info", "lang"] if self.in_title_info() => self.language = value,
            ["title-info", "genre"] if self.in_title_info() => self.genres.extend(value),
            ["title-info", "date"] if self.in_title_info() => self.date = value,
            ["title-info", "keywords"] if self.in_title_info() => {
                self.keywords.extend(
                    value
                        .iter()
                        .flat_map(|v| v.split(','))
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty()),
                );
            }
            ["title-info", "author", field] if self.in_title_info() => match *field {
                "first-name" => self.author.first_name = value,
                "middle-name" => self.author.middle_name = value,
                "last-name" => self.author.last_name = value,
                "nickname" => self.author.nickname = value,
                _ => {}
            },
            ["title-info", "author"] if self.in_title_info() => {
                let author = std::mem::take(&mut self.author);
                if !author.is_empty() {
                    self.authors.push(author);
                }
            }
            ["title-info", "annotation", ..] if self.in_title_info() && name == "p" => {
                self.annotation_text.push('\n');
            }
            ["title-info", "annotation"] if self.in_title_info() => {
                let lines: Vec<&str> = self
                    .annotation_text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect();
                self.annotation = non_empty(&lines.join("\n"));
            }
            ["document-info", "id"] => self.document_id = value,
            ["publish-info", "publisher"] => self.publisher = value,
            ["publish-info", "year"] => self.year = value,
            ["publish-info", "isbn"] => self.isbn = value,
            _ => {}
        }
        self.path.pop();
        self.text.clear();
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Name-based (v5) UUID over the descriptive fields of the source, so a
/// document without `document-info/id` gets the same identifier on every run.
pub fn derived_identifier(harvest: &DescriptionHarvest) -> String {
    let mut name = String::new();
    let fields = [
        harvest.title.as_deref(),
        harvest.language.as_deref(),
        harvest.date.as_deref(),
        harvest.year.as_deref(),
        harvest.publisher.as_deref(),
        harvest.isbn.as_deref(),
        harvest.annotation.as_deref(),
        harvest.sequence.as_ref().map(|s| s.name.as_str()),
    ];
    for field in fields {
        name.push_str(field.unwrap_or_default());
        name.push('\n');
    }
    for author in &harvest.authors {
        name.push_str(&author.display_name());
        name.push('\n');
    }
    for genre in &harvest.genres {
        name.push_str(genre);
        name.push('\n');
    }
    let uuid = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes());
    format!("urn:uuid:{uuid}")
}

/// Merge the catalog record (preferred) with the description harvest.
///
/// Fields missing from both are left empty; title and language always get
/// a value and the identifier falls back to [`derived_identifier`].
pub fn adapt(
    harvest: &DescriptionHarvest,
    record: Option<&BookRecord>,
    default_language: &str,
    identifier: Option<&str>,
) -> PackageMetadata {
    let record_title = record.map(|r| r.title.trim()).filter(|t| !t.is_empty());
    let title = record_title
        .map(str::to_string)
        .or_else(|| harvest.title.clone())
        .unwrap_or_else(|| "Untitled".to_string());

    let language = record
        .and_then(|r| r.language.clone())
        .filter(|l| !l.trim().is_empty())
        .or_else(|| harvest.language.clone())
        .unwrap_or_else(|| default_language.to_string());

    let creators: Vec<Person> = match record {
        Some(r) if !r.authors.is_empty() => r
            .authors
            .iter()
            .filter(|a| !a.name.trim().is_empty())
            .map(|a| Person {
                name: a.name.trim().to_string(),
                file_as: a.sort.clone().filter(|s| !s.trim().is_empty()),
            })
            .collect(),
        _ => harvest
            .authors
            .iter()
            .map(|a| Person {
                name: a.display_name(),
                file_as: a.sort_name(),
            })
            .collect(),
    };

    let subjects = match record {
        Some(r) if !r.genres.is_empty() => r.genres.clone(),
        _ => harvest
            .genres
            .iter()
            .chain(harvest.keywords.iter())
            .cloned()
            .collect(),
    };

    let description = record
        .and_then(|r| r.plot.clone())
        .filter(|p| !p.trim().is_empty())
        .or_else(|| harvest.annotation.clone());

    let cover_href = record
        .and_then(|r| r.cover_id.clone())
        .or_else(|| harvest.cover_href.clone())
        .map(|c| c.trim_start_matches('#').to_string())
        .filter(|c| !c.is_empty());

    let identifier = identifier
        .map(str::to_string)
        .or_else(|| harvest.document_id.clone())
        .unwrap_or_else(|| derived_identifier(harvest));

    PackageMetadata {
        identifier,
        title,
        sort_title: record.and_then(|r| r.sort_title.clone()),
        language,
        creators,
        subjects,
        description,
        publisher: harvest.publisher.clone(),
        date: harvest.date.clone().or_else(|| harvest.year.clone()),
        isbn: harvest.isbn.clone(),
        series: harvest.sequence.clone(),
        cover_href,
        modified: None,
    }
}
