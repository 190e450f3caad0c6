use crate::epub::writer::xml_escape;
use crate::epub::{ManifestItem, PackageMetadata, SpineItem};
use crate::util::format_iso8601;

/// Render `content.opf` from metadata and the manifest/spine accumulated by
/// the writer. The nav document, NCX and stylesheet items are always
/// declared.
pub fn render_opf(
    metadata: &PackageMetadata,
    manifest: &[ManifestItem],
    spine: &[SpineItem],
) -> String {
    let mut opf = String::new();
    opf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    opf.push_str("<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"uid\">\n");

    // Metadata
    opf.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n");

    opf.push_str(&format!(
        "    <dc:identifier id=\"uid\">{}</dc:identifier>\n",
        xml_escape(&metadata.identifier)
    ));
    if let Some(ref isbn) = metadata.isbn {
        opf.push_str(&format!(
            "    <dc:identifier>urn:isbn:{}</dc:identifier>\n",
            xml_escape(isbn)
        ));
    }

    opf.push_str(&format!(
        "    <dc:title id=\"title\">{}</dc:title>\n",
        xml_escape(&metadata.title)
    ));
    if let Some(ref sort) = metadata.sort_title {
        opf.push_str(&format!(
            "    <meta refines=\"#title\" property=\"file-as\">{}</meta>\n",
            xml_escape(sort)
        ));
    }

    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(&metadata.language)
    ));

    for (i, creator) in metadata.creators.iter().enumerate() {
        let id = format!("creator{}", i + 1);
        opf.push_str(&format!(
            "    <dc:creator id=\"{id}\">{}</dc:creator>\n",
            xml_escape(&creator.name)
        ));
        opf.push_str(&format!(
            "    <meta refines=\"#{id}\" property=\"role\" scheme=\"marc:relators\">aut</meta>\n"
        ));
        if let Some(ref file_as) = creator.file_as {
            opf.push_str(&format!(
                "    <meta refines=\"#{id}\" property=\"file-as\">{}</meta>\n",
                xml_escape(file_as)
            ));
        }
    }

    if let Some(ref publisher) = metadata.publisher {
        opf.push_str(&format!(
            "    <dc:publisher>{}</dc:publisher>\n",
            xml_escape(publisher)
        ));
    }

    if let Some(ref desc) = metadata.description {
        opf.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            xml_escape(desc)
        ));
    }

    for subject in &metadata.subjects {
        opf.push_str(&format!(
            "    <dc:subject>{}</dc:subject>\n",
            xml_escape(subject)
        ));
    }

    if let Some(ref date) = metadata.date {
        opf.push_str(&format!("    <dc:date>{}</dc:date>\n", xml_escape(date)));
    }

    if let Some(ref series) = metadata.series {
        opf.push_str(&format!(
            "    <meta property=\"belongs-to-collection\" id=\"series\">{}</meta>\n",
            xml_escape(&series.name)
        ));
        opf.push_str("    <meta refines=\"#series\" property=\"collection-type\">series</meta>\n");
        if let Some(ref index) = series.index {
            opf.push_str(&format!(
                "    <meta refines=\"#series\" property=\"group-position\">{}</meta>\n",
                xml_escape(index)
            ));
        }
    }

    // Modified timestamp (required for EPUB 3)
    opf.push_str("    <meta property=\"dcterms:modified\">");
    if let Some(ref modified) = metadata.modified {
        opf.push_str(modified);
    } else {
        opf.push_str(&format_iso8601());
    }
    opf.push_str("</meta>\n");

    // EPUB 2 readers find the cover through this meta.
    if let Some(ref cover) = metadata.cover_href
        && let Some(item) = manifest.iter().find(|m| &m.href == cover)
    {
        opf.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            xml_escape(&item.id)
        ));
    }

    opf.push_str("  </metadata>\n");

    // Manifest
    opf.push_str("  <manifest>\n");
    opf.push_str("    <item id=\"toc\" href=\"toc.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    opf.push_str("    <item id=\"style\" href=\"style.css\" media-type=\"text/css\"/>\n");

    for item in manifest {
        let is_cover = metadata.cover_href.as_deref() == Some(item.href.as_str())
            && item.media_type.starts_with("image/");
        let props = match (&item.properties, is_cover) {
            (Some(p), _) => format!(" properties=\"{p}\""),
            (None, true) => " properties=\"cover-image\"".to_string(),
            (None, false) => String::new(),
        };
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{props}/>\n",
            xml_escape(&item.id),
            xml_escape(&item.href),
            xml_escape(&item.media_type)
        ));
    }
    opf.push_str("  </manifest>\n");

    // Spine
    opf.push_str("  <spine toc=\"ncx\">\n");
    for item in spine {
        let linear = if item.linear { "" } else { " linear=\"no\"" };
        opf.push_str(&format!(
            "    <itemref idref=\"{}\"{linear}/>\n",
            xml_escape(&item.idref)
        ));
    }
    opf.push_str("  </spine>\n");

    if spine.first().is_some_and(|s| s.idref == "cover") {
        opf.push_str("  <guide>\n");
        opf.push_str("    <reference type=\"cover\" title=\"Cover\" href=\"cover.xhtml\"/>\n");
        opf.push_str("  </guide>\n");
    }

    opf.push_str("</package>\n");
    opf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::{Person, Series};

    fn test_metadata() -> PackageMetadata {
        PackageMetadata {
            identifier: "urn:uuid:12345".to_string(),
            title: "Test Title".to_string(),
            sort_title: Some("Title, Test".to_string()),
            language: "ru".to_string(),
            creators: vec![Person {
                name: "Lev Tolstoy".to_string(),
                file_as: Some("Tolstoy, Lev".to_string()),
            }],
            subjects: vec!["prose_classic".to_string()],
            description: Some("A <long> novel".to_string()),
            publisher: Some("Test Publisher".to_string()),
            date: Some("1869".to_string()),
            isbn: Some("978-3-16-148410-0".to_string()),
            series: Some(Series {
                name: "Collected Works".to_string(),
                index: Some("5".to_string()),
            }),
            cover_href: Some("cover.jpg".to_string()),
            modified: Some("2024-01-01T00:00:00Z".to_string()),
        }
    }

    fn test_manifest() -> Vec<ManifestItem> {
        vec![
            ManifestItem {
                id: "cover".to_string(),
                href: "cover.xhtml".to_string(),
                media_type: "application/xhtml+xml".to_string(),
                properties: None,
            },
            ManifestItem {
                id: "chapter_1".to_string(),
                href: "chapter_1.xhtml".to_string(),
                media_type: "application/xhtml+xml".to_string(),
                properties: None,
            },
            ManifestItem {
                id: "asset-cover.jpg".to_string(),
                href: "cover.jpg".to_string(),
                media_type: "image/jpeg".to_string(),
                properties: None,
            },
        ]
    }

    fn test_spine() -> Vec<SpineItem> {
        vec![
            SpineItem {
                idref: "cover".to_string(),
                linear: true,
            },
            SpineItem {
                idref: "chapter_1".to_string(),
                linear: true,
            },
        ]
    }

    #[test]
    fn test_render_opf_metadata() {
        let opf = render_opf(&test_metadata(), &test_manifest(), &test_spine());
        assert!(opf.contains("<dc:identifier id=\"uid\">urn:uuid:12345</dc:identifier>"));
        assert!(opf.contains("<dc:identifier>urn:isbn:978-3-16-148410-0</dc:identifier>"));
        assert!(opf.contains("<dc:title id=\"title\">Test Title</dc:title>"));
        assert!(opf.contains("<meta refines=\"#title\" property=\"file-as\">Title, Test</meta>"));
        assert!(opf.contains("<dc:language>ru</dc:language>"));
        assert!(opf.contains("<dc:creator id=\"creator1\">Lev Tolstoy</dc:creator>"));
        assert!(opf.contains("<meta refines=\"#creator1\" property=\"file-as\">Tolstoy, Lev</meta>"));
        assert!(opf.contains("<dc:subject>prose_classic</dc:subject>"));
        assert!(opf.contains("<dc:description>A &lt;long&gt; novel</dc:description>"));
        assert!(opf.contains("<meta refines=\"#series\" property=\"group-position\">5</meta>"));
        assert!(opf.contains("<meta property=\"dcterms:modified\">2024-01-01T00:00:00Z</meta>"));
    }

    #[test]
    fn test_render_opf_cover() {
        let opf = render_opf(&test_metadata(), &test_manifest(), &test_spine());
        assert!(opf.contains("<meta name=\"cover\" content=\"asset-cover.jpg\"/>"));
        assert!(opf.contains(
            "<item id=\"asset-cover.jpg\" href=\"cover.jpg\" media-type=\"image/jpeg\" properties=\"cover-image\"/>"
        ));
        assert!(opf.contains("<itemref idref=\"cover\"/>"));
        assert!(opf.contains("<reference type=\"cover\""));
    }

    #[test]
    fn test_render_opf_minimal() {
        let metadata = PackageMetadata {
            identifier: "id".to_string(),
            title: "T".to_string(),
            language: "en".to_string(),
            ..Default::default()
        };
        let opf = render_opf(&metadata, &[], &[]);
        assert!(opf.contains("<dc:language>en</dc:language>"));
        assert!(!opf.contains("dc:creator"));
        assert!(!opf.contains("name=\"cover\""));
        assert!(!opf.contains("<guide>"));
        assert!(opf.contains("<meta property=\"dcterms:modified\">"));
    }

    #[test]
    fn test_render_opf_spine_order() {
        let opf = render_opf(&test_metadata(), &test_manifest(), &test_spine());
        let cover = opf.find("<itemref idref=\"cover\"").unwrap();
        let chapter = opf.find("<itemref idref=\"chapter_1\"").unwrap();
        assert!(cover < chapter);
    }
}
