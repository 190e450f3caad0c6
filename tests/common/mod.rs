use std::io::Read;
use std::path::{Path, PathBuf};

/// Resolve a fixture FB2 by name from tests/fixtures/
pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    assert!(path.exists(), "fixture not found: {}", path.display());
    path
}

/// Copy a fixture into a temp directory so conversions can write beside it.
/// Returns (TempDir, path_to_copy). TempDir must be kept alive.
#[allow(dead_code)]
pub fn temp_copy(fixture_name: &str) -> (tempfile::TempDir, PathBuf) {
    let src = fixture_path(fixture_name);
    let tmp = tempfile::TempDir::new().expect("create temp dir");
    let dest = tmp.path().join(fixture_name);
    std::fs::copy(&src, &dest).expect("copy fixture");
    (tmp, dest)
}

/// Read one archive entry as text.
#[allow(dead_code)]
pub fn read_entry(epub: &Path, name: &str) -> String {
    let file = std::fs::File::open(epub).expect("open epub");
    let mut archive = zip::ZipArchive::new(file).expect("open zip");
    let mut entry = archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing entry {name}"));
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("read entry");
    content
}

/// Names of all entries, in archive order.
#[allow(dead_code)]
pub fn entry_names(epub: &Path) -> Vec<String> {
    let file = std::fs::File::open(epub).expect("open epub");
    let archive = zip::ZipArchive::new(file).expect("open zip");
    archive.file_names().map(str::to_string).collect::<Vec<_>>()
}

/// Spine idrefs from the package document, in reading order.
#[allow(dead_code)]
pub fn spine_ids(epub: &Path) -> Vec<String> {
    read_entry(epub, "OEBPS/content.opf")
        .lines()
        .filter_map(|l| l.trim().strip_prefix("<itemref idref=\""))
        .filter_map(|l| l.split('"').next())
        .map(str::to_string)
        .collect()
}

/// Basic structural validation of an EPUB file
#[allow(dead_code)]
pub fn assert_valid_epub(path: &Path) {
    let file = std::fs::File::open(path).expect("open epub");
    let mut archive = zip::ZipArchive::new(file).expect("open zip");

    // Check mimetype is first entry and stored
    let mut mimetype = archive.by_index(0).expect("first entry");
    assert_eq!(mimetype.name(), "mimetype");
    assert_eq!(mimetype.compression(), zip::CompressionMethod::Stored);
    let mut content = String::new();
    mimetype.read_to_string(&mut content).expect("read mimetype");
    assert_eq!(content, "application/epub+zip");
    drop(mimetype);

    for required in [
        "META-INF/container.xml",
        "OEBPS/content.opf",
        "OEBPS/toc.xhtml",
        "OEBPS/toc.ncx",
        "OEBPS/style.css",
    ] {
        archive
            .by_name(required)
            .unwrap_or_else(|_| panic!("missing {required}"));
    }
}
