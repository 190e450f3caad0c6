//! EPUB container output.
//!
//! Entries are written into the zip as soon as they are produced, so pages
//! and images never accumulate in memory. Only the manifest and spine are
//! kept until [`EpubWriter::finish`] renders the package and navigation
//! documents.

use crate::epub::navigation::{render_nav_xhtml, render_ncx};
use crate::epub::opf::render_opf;
use crate::epub::{ManifestItem, NavEntry, OPF_DIR, PackageMetadata, SpineItem};
use crate::error::{FbxError, Result};
use std::collections::HashSet;
use std::io::{Seek, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const MIMETYPE: &str = "application/epub+zip";

/// Stylesheet used when the caller does not supply one.
pub const DEFAULT_STYLESHEET: &str = include_str!("style.css");

/// Entry names under `OPF_DIR` that content may not claim.
const RESERVED: &[&str] = &["content.opf", "toc.xhtml", "toc.ncx", "style.css", "cover.xhtml"];

/// Manifest ids of the package's own items.
const RESERVED_IDS: &[&str] = &["cover", "ncx", "style", "toc"];

pub struct EpubWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    deflate: SimpleFileOptions,
    names: HashSet<String>,
    manifest: Vec<ManifestItem>,
    spine: Vec<SpineItem>,
}

impl<W: Write + Seek> EpubWriter<W> {
    /// Start a new archive: `mimetype` (stored, first), `container.xml` and
    /// the stylesheet.
    pub fn new(sink: W, stylesheet: &str) -> Result<Self> {
        let mut zip = ZipWriter::new(sink);

        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("mimetype", stored)
            .map_err(|e| sink_error("mimetype", e))?;
        zip.write_all(MIMETYPE.as_bytes())
            .map_err(|e| sink_error("mimetype", e.into()))?;

        let deflate = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut writer = Self {
            zip,
            deflate,
            names: RESERVED.iter().map(|s| s.to_string()).collect(),
            manifest: Vec::new(),
            spine: Vec::new(),
        };
        writer.write_entry("META-INF/container.xml", generate_container_xml().as_bytes())?;
        writer.write_entry(&format!("{OPF_DIR}/style.css"), stylesheet.as_bytes())?;
        Ok(writer)
    }

    fn write_entry(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.zip
            .start_file(path, self.deflate)
            .map_err(|e| sink_error(path, e))?;
        self.zip
            .write_all(data)
            .map_err(|e| sink_error(path, e.into()))?;
        Ok(())
    }

    /// Claim a content entry name; `false` if something already uses it.
    fn claim(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }

    /// Wrap `body` in the page template, write `<name>.xhtml` and append it
    /// to the manifest and spine. Returns `false` when the name is taken and
    /// nothing was written.
    pub fn add_page(&mut self, name: &str, title: &str, body: &str) -> Result<bool> {
        let href = format!("{name}.xhtml");
        if RESERVED_IDS.contains(&name) || !self.claim(&href) {
            tracing::warn!(page = %href, "duplicate page name, skipping");
            return Ok(false);
        }
        let page = render_page(title, body);
        self.write_entry(&format!("{OPF_DIR}/{href}"), page.as_bytes())?;
        self.manifest.push(ManifestItem {
            id: name.to_string(),
            href,
            media_type: "application/xhtml+xml".to_string(),
            properties: None,
        });
        self.spine.push(SpineItem {
            idref: name.to_string(),
            linear: true,
        });
        Ok(true)
    }

    /// Write `cover.xhtml` showing `image_href` and put it first in the spine.
    pub fn add_cover_page(&mut self, image_href: &str, title: &str) -> Result<()> {
        if self.manifest.iter().any(|m| m.id == "cover") {
            return Ok(());
        }
        let body = format!(
            "<div class=\"cover\"><img src=\"{}\" alt=\"{}\"/></div>\n",
            xml_escape(image_href),
            xml_escape(title)
        );
        let page = render_page(title, &body);
        self.write_entry(&format!("{OPF_DIR}/cover.xhtml"), page.as_bytes())?;
        self.manifest.insert(
            0,
            ManifestItem {
                id: "cover".to_string(),
                href: "cover.xhtml".to_string(),
                media_type: "application/xhtml+xml".to_string(),
                properties: None,
            },
        );
        self.spine.insert(
            0,
            SpineItem {
                idref: "cover".to_string(),
                linear: true,
            },
        );
        Ok(())
    }

    /// Write a binary resource under its source name.
    pub fn add_binary(&mut self, name: &str, content_type: &str, data: &[u8]) -> Result<()> {
        if !self.claim(name) {
            tracing::warn!(binary = %name, "duplicate binary name, skipping");
            return Ok(());
        }
        self.write_entry(&format!("{OPF_DIR}/{name}"), data)?;
        self.manifest.push(ManifestItem {
            id: format!("asset-{}", crate::util::xml_id(name)),
            href: name.to_string(),
            media_type: content_type.to_string(),
            properties: None,
        });
        Ok(())
    }

    pub fn manifest(&self) -> &[ManifestItem] {
        &self.manifest
    }

    pub fn spine(&self) -> &[SpineItem] {
        &self.spine
    }

    /// Render the package document and both navigation documents, then
    /// close the archive and hand back the sink.
    pub fn finish(mut self, metadata: &PackageMetadata, nav: &[NavEntry]) -> Result<W> {
        let fallback;
        let nav = if nav.is_empty() {
            fallback = self.fallback_nav(&metadata.title);
            &fallback[..]
        } else {
            nav
        };

        let opf = render_opf(metadata, &self.manifest, &self.spine);
        self.write_entry(&format!("{OPF_DIR}/content.opf"), opf.as_bytes())?;

        let toc_xhtml = render_nav_xhtml(nav, &metadata.title);
        self.write_entry(&format!("{OPF_DIR}/toc.xhtml"), toc_xhtml.as_bytes())?;

        let toc_ncx = render_ncx(nav, &metadata.title, &metadata.identifier);
        self.write_entry(&format!("{OPF_DIR}/toc.ncx"), toc_ncx.as_bytes())?;

        self.zip.finish().map_err(|e| sink_error("central directory", e))
    }

    /// A single entry pointing at the first content page, for books without
    /// any headings.
    fn fallback_nav(&self, title: &str) -> Vec<NavEntry> {
        self.spine
            .iter()
            .find(|s| s.idref != "cover")
            .or(self.spine.first())
            .map(|s| NavEntry {
                id: None,
                order: 0,
                title: title.to_string(),
                href: format!("{}.xhtml", s.idref),
                depth: 1,
            })
            .into_iter()
            .collect()
    }
}

fn sink_error(entry: &str, source: zip::result::ZipError) -> FbxError {
    FbxError::SinkWrite {
        entry: entry.to_string(),
        source,
    }
}

fn generate_container_xml() -> String {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"##
        .to_string()
}

/// XHTML page template shared by content and cover pages.
pub fn render_page(title: &str, body: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE html>\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n",
            "<head>\n",
            "  <meta charset=\"UTF-8\"/>\n",
            "  <title>{title}</title>\n",
            "  <link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\"/>\n",
            "</head>\n",
            "<body>\n",
            "{body}",
            "</body>\n",
            "</html>\n",
        ),
        title = xml_escape(title),
        body = body,
    )
}

pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
