mod common;

use fbx::{ConvertOptions, FbxError, JsonCatalog, Phase};
use std::path::Path;

fn convert(input: &Path, output: &Path) -> fbx::ConversionReport {
    fbx::convert_file(input, output, &ConvertOptions::default(), None).expect("convert")
}

#[test]
fn test_three_chapters_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("three.epub");
    let report = convert(&common::fixture_path("three_chapters.fb2"), &out);

    common::assert_valid_epub(&out);
    assert_eq!(report.pages, ["chapter_1", "chapter_2", "chapter_3"]);
    let names = common::entry_names(&out);
    for page in ["chapter_1", "chapter_2", "chapter_3"] {
        assert!(names.contains(&format!("OEBPS/{page}.xhtml")), "{page} missing");
    }
    assert!(!names.contains(&"OEBPS/chapter_0.xhtml".to_string()));

    let nav: Vec<(&str, u32)> = report
        .nav
        .iter()
        .map(|n| (n.title.as_str(), n.depth))
        .collect();
    assert_eq!(nav, [("First", 1), ("Second", 1), ("Third", 1)]);
    assert_eq!(common::spine_ids(&out), ["chapter_1", "chapter_2", "chapter_3"]);

    let toc = common::read_entry(&out, "OEBPS/toc.xhtml");
    assert!(toc.contains("<a href=\"chapter_2.xhtml#c2\">Second</a>"));
}

#[test]
fn test_mimetype_is_first_and_stored() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    convert(&common::fixture_path("full.fb2"), &out);
    assert_eq!(common::entry_names(&out)[0], "mimetype");
    common::assert_valid_epub(&out);
}

#[test]
fn test_links_are_rewritten() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    let report = convert(&common::fixture_path("full.fb2"), &out);

    let chapter = common::read_entry(&out, "OEBPS/chapter_1.xhtml");
    assert!(chapter.contains(
        "<a href=\"notes.xhtml#note1\" class=\"note\" epub:type=\"noteref\">1</a>"
    ));
    assert!(chapter.contains("<a href=\"chapter_2.xhtml#ch2-scene\">the scene</a>"));
    assert!(chapter.contains("<a href=\"#ghost\">stays</a>"));
    assert!(chapter.contains("<a href=\"https://example.org/\">the web</a>"));

    let notes = common::read_entry(&out, "OEBPS/notes.xhtml");
    assert!(notes.contains("<a href=\"chapter_1.xhtml#ch1\">chapter one</a>"));

    // Every resolved destination names a page that was written.
    for (_, dest) in report.anchors.iter() {
        assert!(report.pages.contains(&dest.unit), "{} not written", dest.unit);
    }
}

#[test]
fn test_inline_and_block_images() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    convert(&common::fixture_path("full.fb2"), &out);

    let chapter = common::read_entry(&out, "OEBPS/chapter_1.xhtml");
    assert!(chapter.contains("<p>Inline picture <img src=\"pic.png\" alt=\"\"/> here.</p>"));
    assert!(chapter.contains(
        "<div class=\"image\" id=\"fig1\"><img src=\"pic.png\" alt=\"\"/></div>"
    ));
    assert!(common::entry_names(&out).contains(&"OEBPS/pic.png".to_string()));
}

#[test]
fn test_nested_toc() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    let report = convert(&common::fixture_path("full.fb2"), &out);

    let depths: Vec<u32> = report.nav.iter().map(|n| n.depth).collect();
    assert_eq!(depths, [1, 1, 1, 2, 3, 2, 1, 1]);
    let orders: Vec<u32> = report.nav.iter().map(|n| n.order).collect();
    assert_eq!(orders, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(report.nav[0].title, "The Full Book\nA Novel");
    assert_eq!(report.nav[4].href, "chapter_2.xhtml#section_5");

    let toc = common::read_entry(&out, "OEBPS/toc.xhtml");
    assert_eq!(toc.matches("<li>").count(), 8);
    assert_eq!(toc.matches("<li>").count(), toc.matches("</li>").count());
    assert_eq!(toc.matches("<ol>").count(), toc.matches("</ol>").count());
    // The poem title is not a section heading.
    assert!(!toc.contains("A Poem"));

    let ncx = common::read_entry(&out, "OEBPS/toc.ncx");
    assert_eq!(ncx.matches("<navPoint ").count(), 8);
    assert_eq!(ncx.matches("</navPoint>").count(), 8);
}

#[test]
fn test_element_mapping() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    convert(&common::fixture_path("full.fb2"), &out);

    let lead_in = common::read_entry(&out, "OEBPS/chapter_0.xhtml");
    assert!(lead_in.contains("<h1 class=\"title\"><span>The Full Book</span><br/><span>A Novel</span></h1>"));
    assert!(lead_in.contains("<div class=\"epigraph\">"));
    assert!(lead_in.contains("<p class=\"text-author\">Someone</p>"));

    let chapter = common::read_entry(&out, "OEBPS/chapter_1.xhtml");
    assert!(chapter.contains("<div class=\"poem\">"));
    assert!(chapter.contains("<p class=\"v\">Line one</p>"));
    assert!(chapter.contains("<blockquote class=\"cite\">"));
    assert!(chapter.contains("<p>Quoted <em>words</em> &amp; <strong>more</strong>.</p>"));
    assert!(chapter.contains("<td colspan=\"2\">Both</td>"));

    let chapter = common::read_entry(&out, "OEBPS/chapter_2.xhtml");
    assert!(chapter.contains("<h4 class=\"title\"><span>Deeper</span></h4>"));
    assert!(chapter.contains("<p>Deepest text.<br/>\nAfter a break.</p>"));
}

#[test]
fn test_cover_and_metadata() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    let report = convert(&common::fixture_path("full.fb2"), &out);

    assert_eq!(report.metadata.identifier, "full-book-0002");
    assert_eq!(report.metadata.cover_href.as_deref(), Some("cover.jpg"));
    assert_eq!(
        common::spine_ids(&out),
        ["cover", "chapter_0", "chapter_1", "chapter_2", "notes"]
    );

    let opf = common::read_entry(&out, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title id=\"title\">The Full Book</dc:title>"));
    assert!(opf.contains("<dc:creator id=\"creator1\">Ivan P. Petrov</dc:creator>"));
    assert!(opf.contains("property=\"file-as\">Petrov, Ivan P.</meta>"));
    assert!(opf.contains("<dc:description>A book that uses most of the format.</dc:description>"));
    assert!(opf.contains("<dc:publisher>Test House</dc:publisher>"));
    assert!(opf.contains("<dc:subject>fixture</dc:subject>"));
    assert!(opf.contains("properties=\"cover-image\""));
    assert!(opf.contains("belongs-to-collection"));
}

#[test]
fn test_catalog_record_overrides_source() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    let catalog = JsonCatalog::load(&common::fixture_path("catalog.json")).unwrap();
    let options = ConvertOptions {
        book_id: Some("full-0002".into()),
        ..Default::default()
    };
    let report = fbx::convert_file(
        &common::fixture_path("full.fb2"),
        &out,
        &options,
        Some(&catalog),
    )
    .unwrap();

    assert_eq!(report.metadata.title, "The Full Book (Catalog Edition)");
    let opf = common::read_entry(&out, "OEBPS/content.opf");
    assert!(opf.contains("<dc:subject>Science Fiction</dc:subject>"));
    assert!(opf.contains("<dc:description>Catalog description.</dc:description>"));
    let page = common::read_entry(&out, "OEBPS/chapter_1.xhtml");
    assert!(page.contains("<title>The Full Book (Catalog Edition)</title>"));
}

#[test]
fn test_missing_catalog_record_falls_back() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("full.epub");
    let catalog = JsonCatalog::load(&common::fixture_path("catalog.json")).unwrap();
    let options = ConvertOptions {
        book_id: Some("no-such-book".into()),
        ..Default::default()
    };
    let report = fbx::convert_file(
        &common::fixture_path("full.fb2"),
        &out,
        &options,
        Some(&catalog),
    )
    .unwrap();

    assert_eq!(report.metadata.title, "The Full Book");
    common::assert_valid_epub(&out);
}

#[test]
fn test_cp1251_source() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("war.epub");
    let report = convert(&common::fixture_path("cp1251.fb2"), &out);

    assert_eq!(report.metadata.title, "Война и мир");
    assert_eq!(report.metadata.language, "ru");
    assert_eq!(report.nav[0].title, "Том первый");
    let page = common::read_entry(&out, "OEBPS/chapter_1.xhtml");
    assert!(page.contains("Генуя и Лукка"));
    assert!(page.contains("<meta charset=\"UTF-8\"/>"));
}

#[test]
fn test_conversion_is_idempotent() {
    let tmp = tempfile::TempDir::new().unwrap();
    let first = tmp.path().join("a.epub");
    let second = tmp.path().join("b.epub");
    let input = common::fixture_path("full.fb2");
    let a = convert(&input, &first);
    let b = convert(&input, &second);

    assert_eq!(a.anchors, b.anchors);
    assert_eq!(a.nav, b.nav);
    for entry in [
        "OEBPS/chapter_0.xhtml",
        "OEBPS/chapter_1.xhtml",
        "OEBPS/chapter_2.xhtml",
        "OEBPS/notes.xhtml",
        "OEBPS/toc.xhtml",
        "OEBPS/toc.ncx",
    ] {
        assert_eq!(
            common::read_entry(&first, entry),
            common::read_entry(&second, entry),
            "{entry} differs"
        );
    }
}

#[test]
fn test_failed_conversion_leaves_no_output() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("broken.epub");
    let err = fbx::convert_file(
        &common::fixture_path("truncated.fb2"),
        &out,
        &ConvertOptions::default(),
        None,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        FbxError::SourceDecode {
            phase: Phase::Resolve,
            ..
        }
    ));
    assert!(!out.exists());
    assert!(!tmp.path().join("broken.epub.tmp").exists());
}

#[test]
fn test_failed_conversion_keeps_existing_output() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = tmp.path().join("book.epub");
    std::fs::write(&out, b"previous").unwrap();
    assert!(
        fbx::convert_file(
            &common::fixture_path("truncated.fb2"),
            &out,
            &ConvertOptions::default(),
            None,
        )
        .is_err()
    );
    assert_eq!(std::fs::read(&out).unwrap(), b"previous");
}

#[test]
fn test_custom_stylesheet() {
    let tmp = tempfile::TempDir::new().unwrap();
    let css = tmp.path().join("book.css");
    std::fs::write(&css, "p { margin: 0; }").unwrap();
    let out = tmp.path().join("three.epub");
    let options = ConvertOptions {
        stylesheet: Some(css),
        ..Default::default()
    };
    fbx::convert_file(
        &common::fixture_path("three_chapters.fb2"),
        &out,
        &options,
        None,
    )
    .unwrap();
    assert_eq!(common::read_entry(&out, "OEBPS/style.css"), "p { margin: 0; }");
}

#[test]
fn test_resolve_anchors() {
    let mut source = fbx::fb2::open_path(&common::fixture_path("full.fb2")).unwrap();
    let index = fbx::resolve_anchors(&mut source).unwrap();
    assert_eq!(index.resolve("#ch2-scene").unwrap().unit, "chapter_2");
    assert_eq!(index.resolve("#note1").unwrap().href(), "notes.xhtml#note1");
    assert_eq!(index.resolve("#fig1").unwrap().unit, "chapter_1");
    assert!(index.resolve("#ghost").is_none());
}
