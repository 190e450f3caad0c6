//! Second pass: stream the FB2 document into EPUB pages.
//!
//! The transcoder keeps a stack of open elements (each with the markup that
//! closes it) instead of a tree. Pages are flushed to the archive as soon as
//! the next body or top-level chapter starts; headings become navigation
//! entries and binaries are decoded straight into the archive.

mod markup;

pub use markup::escape_text;

use crate::config::ConvertOptions;
use crate::epub::writer::{EpubWriter, xml_escape};
use crate::epub::{NavEntry, PackageMetadata};
use crate::error::{FbxError, Phase, Result};
use crate::fb2::anchors::{self, AnchorIndex};
use crate::fb2::outline::{Outline, Step};
use crate::fb2::{Source, attr, decode_error, local_name};
use crate::metadata::{Catalog, DescriptionHarvest, adapt};
use crate::util::infer_media_type;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use markup::Markup;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::io::{BufRead, Seek, Write};

/// Binaries in the wild are often missing padding or over-padded.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// What a conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// Content pages in spine order (cover excluded).
    pub pages: Vec<String>,
    pub nav: Vec<NavEntry>,
    pub assets: Vec<String>,
    pub anchors: AnchorIndex,
    pub metadata: PackageMetadata,
}

/// Convert an FB2 source into an EPUB written to `sink`.
///
/// The source is read twice: once to resolve anchors, once to transcode.
/// Entries are written to the sink as they are produced, so on error the
/// sink holds a partial archive.
pub fn convert<R: BufRead + Seek, W: Write + Seek>(
    source: &mut Source<R>,
    sink: &mut W,
    options: &ConvertOptions,
    catalog: Option<&dyn Catalog>,
) -> Result<ConversionReport> {
    let anchors = anchors::resolve(source)?;
    let stylesheet = options.stylesheet_css()?;
    let writer = EpubWriter::new(sink, &stylesheet)?;
    let transcoder = Transcoder::new(&anchors, options, catalog, writer);
    let (metadata, nav, pages, assets) = transcoder.run(source)?;

    tracing::info!(
        pages = pages.len(),
        nav_entries = nav.len(),
        assets = assets.len(),
        "conversion complete"
    );
    Ok(ConversionReport {
        pages,
        nav,
        assets,
        anchors,
        metadata,
    })
}

/// Navigation entries a conversion would produce. The archive is built in
/// memory and dropped.
pub fn outline_headings<R: BufRead + Seek>(source: &mut Source<R>) -> Result<Vec<NavEntry>> {
    let report = convert(
        source,
        &mut std::io::Cursor::new(Vec::new()),
        &ConvertOptions::default(),
        None,
    )?;
    Ok(report.nav)
}

/// An element on the open-element stack.
struct Open {
    name: String,
    close: String,
}

/// The page currently receiving markup.
struct Page {
    name: String,
    buf: String,
}

/// An eligible title being captured for the navigation tree.
struct Heading {
    /// Stack height below the title element.
    base: usize,
    depth: u32,
    id: Option<String>,
    lines: Vec<String>,
    text: String,
    spans: usize,
}

impl Heading {
    fn break_line(&mut self) {
        let line = self.text.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
        self.text.clear();
    }
}

struct Binary {
    id: String,
    content_type: Option<String>,
    data: String,
}

struct Transcoder<'a, W: Write + Seek> {
    anchors: &'a AnchorIndex,
    options: &'a ConvertOptions,
    catalog: Option<&'a dyn Catalog>,
    writer: EpubWriter<W>,
    outline: Outline,
    stack: Vec<Open>,
    page: Option<Page>,
    heading: Option<Heading>,
    sections: Vec<String>,
    bodies_open: usize,
    description: Option<usize>,
    harvest: DescriptionHarvest,
    metadata: Option<PackageMetadata>,
    binary: Option<Binary>,
    nav: Vec<NavEntry>,
    pages: Vec<String>,
    assets: Vec<String>,
}

type Output = (PackageMetadata, Vec<NavEntry>, Vec<String>, Vec<String>);

impl<'a, W: Write + Seek> Transcoder<'a, W> {
    fn new(
        anchors: &'a AnchorIndex,
        options: &'a ConvertOptions,
        catalog: Option<&'a dyn Catalog>,
        writer: EpubWriter<W>,
    ) -> Self {
        Self {
            anchors,
            options,
            catalog,
            writer,
            outline: Outline::new(),
            stack: Vec::new(),
            page: None,
            heading: None,
            sections: Vec::new(),
            bodies_open: 0,
            description: None,
            harvest: DescriptionHarvest::new(),
            metadata: None,
            binary: None,
            nav: Vec::new(),
            pages: Vec::new(),
            assets: Vec::new(),
        }
    }

    fn run<R: BufRead + Seek>(mut self, source: &mut Source<R>) -> Result<Output> {
        let mut reader = source.rewind()?;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => self.start(e)?,
                Ok(Event::Empty(ref e)) => {
                    self.start(e)?;
                    self.end()?;
                }
                Ok(Event::End(_)) => self.end()?,
                Ok(Event::Text(ref t)) => {
                    let raw = String::from_utf8_lossy(t);
                    let text = t
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    self.text(&raw, &text);
                }
                Ok(Event::CData(ref c)) => {
                    let text = String::from_utf8_lossy(c);
                    self.text(&xml_escape(&text), &text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(decode_error(Phase::Transcode, &reader, err)),
            }
            buf.clear();
        }

        if let Some(open) = self.stack.last() {
            return Err(decode_error(
                Phase::Transcode,
                &reader,
                format!("unexpected end of document inside <{}>", open.name),
            ));
        }
        self.finish()
    }

    fn push(&mut self, name: String, markup: Markup) {
        self.emit(&markup.open);
        self.stack.push(Open {
            name,
            close: markup.close,
        });
    }

    fn emit(&mut self, s: &str) {
        if let Some(page) = self.page.as_mut() {
            page.buf.push_str(s);
        }
    }

    fn parent(&self) -> Option<&str> {
        self.stack.last().map(|o| o.name.as_str())
    }

    fn start(&mut self, e: &BytesStart) -> Result<()> {
        let name = local_name(e);

        if self.description.is_some() {
            self.harvest.start(&name, e);
            self.stack.push(Open {
                name,
                close: String::new(),
            });
            return Ok(());
        }

        match name.as_str() {
            "description" if self.bodies_open == 0 => {
                self.description = Some(self.stack.len());
                self.push(name, Markup::transparent());
            }
            "binary" if self.bodies_open == 0 => {
                self.binary = attr(e, "id").map(|id| Binary {
                    id,
                    content_type: attr(e, "content-type"),
                    data: String::new(),
                });
                self.push(name, Markup::transparent());
            }
            "body" => {
                self.bodies_open += 1;
                let body_name = attr(e, "name");
                self.outline.enter("body", body_name.as_deref());
                self.sections.clear();
                self.open_page()?;
                if let Some(id) = attr(e, "id") {
                    let marker = format!("<div class=\"body\" id=\"{}\"></div>\n", xml_escape(&id));
                    self.emit(&marker);
                }
                self.push(name, Markup::transparent());
            }
            _ if self.bodies_open == 0 => self.push(name, Markup::transparent()),
            "section" => {
                if self.outline.enter("section", None) == Step::NewUnit {
                    self.open_page()?;
                }
                let id = attr(e, "id")
                    .unwrap_or_else(|| format!("section_{}", self.outline.order()));
                let open = format!("<div class=\"section\" id=\"{}\">\n", xml_escape(&id));
                self.sections.push(id);
                self.push(name, Markup::new(open, "</div>\n"));
            }
            "title" => {
                let markup = self.title(e);
                self.push(name, markup);
            }
            "p" if self.heading.is_some() => {
                if let Some(heading) = self.heading.as_mut() {
                    heading.break_line();
                    heading.spans += 1;
                }
                let spans = self.heading.as_ref().map_or(0, |h| h.spans);
                let open = if spans > 1 { "<br/><span>" } else { "<span>" };
                self.push(name, Markup::new(open.to_string(), "</span>"));
            }
            "empty-line" if self.heading.is_some() => {
                if let Some(heading) = self.heading.as_mut() {
                    heading.break_line();
                }
                self.push(name, Markup::new("<br/>".to_string(), ""));
            }
            "a" => {
                let markup = markup::link(e, self.anchors);
                self.push(name, markup);
            }
            "image" => {
                let inline = self.heading.is_some() || markup::is_inline_parent(self.parent());
                let img = markup::image(e, inline);
                self.emit(&img);
                self.push(name, Markup::transparent());
            }
            _ => {
                let markup = markup::element(&name, e);
                self.push(name, markup);
            }
        }
        Ok(())
    }

    /// Markup for a `<title>`, starting a heading capture when the title
    /// belongs to a body or section and no capture is already running.
    fn title(&mut self, e: &BytesStart) -> Markup {
        let id = markup::id_attr(e);
        let parent = self.parent().unwrap_or_default().to_string();
        if self.heading.is_some() {
            return Markup::new(format!("<span class=\"title\"{id}>"), "</span>");
        }
        if parent != "body" && parent != "section" {
            return Markup::new(format!("<div class=\"title\"{id}>\n"), "</div>\n");
        }
        let (level, depth) = if parent == "body" {
            (1, 1)
        } else {
            let depth = self.outline.depth().max(1);
            ((depth + 1).min(6), depth)
        };
        self.heading = Some(Heading {
            base: self.stack.len(),
            depth,
            id: if parent == "section" {
                self.sections.last().cloned()
            } else {
                None
            },
            lines: Vec::new(),
            text: String::new(),
            spans: 0,
        });
        Markup::new(
            format!("<h{level} class=\"title\"{id}>"),
            format!("</h{level}>\n"),
        )
    }

    fn end(&mut self) -> Result<()> {
        let Some(open) = self.stack.pop() else {
            return Ok(());
        };

        if let Some(base) = self.description {
            if self.stack.len() == base {
                self.description = None;
                self.description_complete();
            } else {
                self.harvest.end(&open.name);
            }
            return Ok(());
        }

        self.emit(&open.close);
        match open.name.as_str() {
            "binary" if self.bodies_open == 0 => self.write_binary()?,
            "body" => {
                self.bodies_open = self.bodies_open.saturating_sub(1);
                self.outline.leave("body");
            }
            "section" => {
                self.sections.pop();
                self.outline.leave("section");
            }
            "p" => {
                if let Some(heading) = self.heading.as_mut() {
                    heading.break_line();
                }
            }
            "title" if self.heading.as_ref().is_some_and(|h| h.base == self.stack.len()) => {
                self.close_heading();
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, raw: &str, text: &str) {
        if self.description.is_some() {
            self.harvest.text(text);
            return;
        }
        if let Some(binary) = self.binary.as_mut() {
            binary.data.push_str(raw);
            return;
        }
        if self.bodies_open == 0 {
            return;
        }
        self.emit(&escape_text(raw));
        if let Some(heading) = self.heading.as_mut() {
            heading.text.push_str(text);
        }
    }

    fn close_heading(&mut self) {
        let Some(mut heading) = self.heading.take() else {
            return;
        };
        heading.break_line();
        if heading.lines.is_empty() {
            return;
        }
        let unit = self.outline.unit();
        let href = match &heading.id {
            Some(id) => format!("{unit}.xhtml#{id}"),
            None => format!("{unit}.xhtml"),
        };
        self.nav.push(NavEntry {
            id: heading.id,
            order: self.outline.order(),
            title: heading.lines.join("\n"),
            href,
            depth: heading.depth,
        });
    }

    /// Flush the current page and open one for the outline's current unit.
    fn open_page(&mut self) -> Result<()> {
        self.flush_page()?;
        self.page = Some(Page {
            name: self.outline.unit().to_string(),
            buf: String::new(),
        });
        Ok(())
    }

    fn flush_page(&mut self) -> Result<()> {
        let Some(page) = self.page.take() else {
            return Ok(());
        };
        if page.buf.trim().is_empty() {
            tracing::debug!(page = %page.name, "skipping empty page");
            return Ok(());
        }
        let title = self.book_title();
        if self.writer.add_page(&page.name, &title, &page.buf)? {
            tracing::debug!(page = %page.name, bytes = page.buf.len(), "page written");
            self.pages.push(page.name);
        }
        Ok(())
    }

    fn book_title(&self) -> String {
        self.metadata
            .as_ref()
            .map(|m| m.title.clone())
            .or_else(|| self.harvest.title.clone())
            .unwrap_or_default()
    }

    fn write_binary(&mut self) -> Result<()> {
        let Some(binary) = self.binary.take() else {
            return Ok(());
        };
        let payload: String = binary.data.split_whitespace().collect();
        let data = LENIENT_BASE64
            .decode(payload.as_bytes())
            .map_err(|source| FbxError::AssetDecode {
                id: binary.id.clone(),
                source,
            })?;
        let content_type = binary
            .content_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| infer_media_type(&binary.id).to_string());
        self.writer.add_binary(&binary.id, &content_type, &data)?;
        tracing::debug!(binary = %binary.id, bytes = data.len(), "asset written");
        self.assets.push(binary.id);
        Ok(())
    }

    /// Resolve package metadata once the description has been read.
    fn description_complete(&mut self) {
        let record = match (self.options.book_id.as_deref(), self.catalog) {
            (Some(id), Some(catalog)) => match catalog.book_metadata(id) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(book_id = %id, error = %err, "catalog lookup failed, using source metadata");
                    None
                }
            },
            _ => None,
        };
        self.metadata = Some(adapt(
            &self.harvest,
            record.as_ref(),
            &self.options.default_language,
            self.options.identifier.as_deref(),
        ));
    }

    fn finish(mut self) -> Result<Output> {
        self.flush_page()?;
        let mut metadata = match self.metadata.take() {
            Some(metadata) => metadata,
            None => adapt(
                &self.harvest,
                None,
                &self.options.default_language,
                self.options.identifier.as_deref(),
            ),
        };

        if let Some(cover) = metadata.cover_href.clone() {
            if self.assets.contains(&cover) {
                self.writer.add_cover_page(&cover, &metadata.title)?;
            } else {
                tracing::warn!(cover = %cover, "cover image not found among binaries");
                metadata.cover_href = None;
            }
        }

        self.writer.finish(&metadata, &self.nav)?;
        Ok((metadata, self.nav, self.pages, self.assets))
    }
}
