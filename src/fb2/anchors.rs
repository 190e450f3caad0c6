//! First pass: map every anchor id in the document to the page that will
//! contain it.

use super::outline::Outline;
use super::{Source, attr, decode_error, local_name};
use crate::error::{Phase, Result};
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufRead, Seek};

/// Where an anchor ends up in the EPUB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub unit: String,
    pub fragment: Option<String>,
}

impl Destination {
    /// Href relative to the content directory, e.g. `notes.xhtml#n1`.
    pub fn href(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}.xhtml#{fragment}", self.unit),
            None => format!("{}.xhtml", self.unit),
        }
    }
}

/// Anchor (`#id`) to destination mapping. Read-only once built.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnchorIndex {
    entries: BTreeMap<String, Destination>,
}

impl AnchorIndex {
    /// Look up a link target as written in the source (`#id`).
    pub fn resolve(&self, href: &str) -> Option<&Destination> {
        self.entries.get(href)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Destination)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Scan the whole source once and build the anchor index.
///
/// Only content inside `<body>` elements is considered; ids on
/// `<description>` children and `<binary>` payloads are not link targets.
/// When an id repeats, the first occurrence wins.
pub fn resolve<R: BufRead + Seek>(source: &mut Source<R>) -> Result<AnchorIndex> {
    let mut reader = source.rewind()?;
    let mut buf = Vec::new();
    let mut index = AnchorIndex::default();
    let mut outline = Outline::new();
    let mut stack: Vec<String> = Vec::new();
    let mut bodies_open = 0usize;

    let mut visit = |e: &BytesStart, name: &str, bodies_open: usize, outline: &mut Outline| {
        if name != "body" && bodies_open == 0 {
            return;
        }
        let body_name = if name == "body" {
            attr(e, "name")
        } else {
            None
        };
        outline.enter(name, body_name.as_deref());
        if let Some(id) = attr(e, "id") {
            index
                .entries
                .entry(format!("#{id}"))
                .or_insert_with(|| Destination {
                    unit: outline.unit().to_string(),
                    fragment: Some(id),
                });
        }
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                visit(e, &name, bodies_open, &mut outline);
                if name == "body" {
                    bodies_open += 1;
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                visit(e, &name, bodies_open, &mut outline);
                outline.leave(&name);
            }
            Ok(Event::End(_)) => {
                if let Some(name) = stack.pop() {
                    if name == "body" {
                        bodies_open -= 1;
                    }
                    outline.leave(&name);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(decode_error(Phase::Resolve, &reader, err)),
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(decode_error(
            Phase::Resolve,
            &reader,
            format!("unexpected end of document inside <{open}>"),
        ));
    }

    tracing::debug!(anchors = index.len(), "link resolution complete");
    Ok(index)
}
