use std::path::Path;

/// Infer a media type from a file name's extension.
///
/// FB2 `<binary>` elements usually declare `content-type`, but some
/// generators leave it out; the binary id is then the only hint.
pub fn infer_media_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("css") => "text/css",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("xhtml") | Some("html") => "application/xhtml+xml",
        _ => "application/octet-stream",
    }
}

/// Make a string usable as an XML `id` / manifest item id.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; everything else becomes `_`.
/// Ids that would start with a digit, `-` or `.` get a `x` prefix.
pub fn xml_id(raw: &str) -> String {
    let mut id: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        id.insert(0, 'x');
    }
    id
}

/// Current UTC time as `YYYY-MM-DDThh:mm:ssZ`, for `dcterms:modified`.
pub fn format_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
