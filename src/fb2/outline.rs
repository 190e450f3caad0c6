//! Destination unit naming shared by both conversion passes.
//!
//! The link resolver and the transcoder each feed an [`Outline`] the same
//! body/section events in the same order, so the file name the resolver
//! records for an anchor is the file the transcoder later writes.

use std::collections::HashSet;

/// Kind label of the first (narrative) body.
pub const PRIMARY_KIND: &str = "chapter";

/// Names the package already uses for its own files and manifest ids.
const RESERVED_UNITS: &[&str] = &["content", "cover", "ncx", "style", "toc"];

/// Whether an element opened a new destination unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Same,
    NewUnit,
}

#[derive(Debug, Default)]
pub struct Outline {
    bodies: u32,
    chapters: u32,
    depth: u32,
    order: u32,
    primary: bool,
    unit: String,
    used: HashSet<String>,
}

impl Outline {
    pub fn new() -> Self {
        Self {
            used: RESERVED_UNITS.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Process an element start. `body_name` is the `name` attribute of a
    /// `<body>`, ignored for other elements.
    pub fn enter(&mut self, element: &str, body_name: Option<&str>) -> Step {
        match element {
            "body" => {
                self.bodies += 1;
                self.order += 1;
                self.depth = 0;
                self.primary = self.bodies == 1;
                self.unit = if self.primary {
                    format!("{PRIMARY_KIND}_0")
                } else {
                    let kind = body_name
                        .map(slug::slugify)
                        .filter(|k| !k.is_empty())
                        .unwrap_or_else(|| format!("comments-{}", self.bodies));
                    if self.used.contains(&kind) {
                        format!("{kind}_{}", self.bodies)
                    } else {
                        kind
                    }
                };
                self.used.insert(self.unit.clone());
                Step::NewUnit
            }
            "section" => {
                self.order += 1;
                let step = if self.primary && self.depth == 0 {
                    self.chapters += 1;
                    self.unit = format!("{PRIMARY_KIND}_{}", self.chapters);
                    Step::NewUnit
                } else {
                    Step::Same
                };
                self.depth += 1;
                step
            }
            _ => Step::Same,
        }
    }

    pub fn leave(&mut self, element: &str) {
        if element == "section" {
            self.depth = self.depth.saturating_sub(1);
        }
    }

    /// Name of the unit currently receiving content (no extension).
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Section nesting depth inside the current body; 0 outside sections.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Running count of body and section boundaries seen so far.
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn in_primary(&self) -> bool {
        self.primary
    }
}
