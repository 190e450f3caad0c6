//! Navigation documents built from a flat, depth-tagged heading list.
//!
//! No tree is materialized. Each renderer walks the entries once and keeps
//! a stack of the depths of the levels it has opened: before an entry is
//! opened, every open level at the same depth or deeper is closed. For
//! contiguous depths that is "equal depth closes one level, shallower by k
//! closes k + 1"; jumps (1 then 3) still nest correctly. Whatever is still
//! open after the last entry is closed at the end.

use crate::epub::NavEntry;
use crate::epub::writer::xml_escape;

/// Open levels, tagged with their depth and per-level renderer state.
struct Levels<T> {
    open: Vec<(u32, T)>,
}

impl<T> Levels<T> {
    fn new() -> Self {
        Self { open: Vec::new() }
    }

    /// Pop one level if it must close before an entry at `depth` opens.
    fn close_for(&mut self, depth: u32) -> Option<T> {
        match self.open.last() {
            Some((d, _)) if *d >= depth => self.open.pop().map(|(_, state)| state),
            _ => None,
        }
    }

    fn close_any(&mut self) -> Option<T> {
        self.open.pop().map(|(_, state)| state)
    }

    fn parent_mut(&mut self) -> Option<&mut T> {
        self.open.last_mut().map(|(_, state)| state)
    }

    fn open(&mut self, depth: u32, state: T) {
        self.open.push((depth, state));
    }
}

/// Render the EPUB 3 navigation document (`toc.xhtml`).
pub fn render_nav_xhtml(entries: &[NavEntry], title: &str) -> String {
    let mut html = String::new();
    html.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    html.push_str("<!DOCTYPE html>\n");
    html.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n");
    html.push_str("<head><title>");
    html.push_str(&xml_escape(title));
    html.push_str("</title></head>\n");
    html.push_str("<body>\n");
    html.push_str("<nav epub:type=\"toc\" id=\"toc\">\n");
    html.push_str("<h1>");
    html.push_str(&xml_escape(title));
    html.push_str("</h1>\n");
    write_nav_ol(&mut html, entries);
    html.push_str("</nav>\n");
    html.push_str("</body>\n</html>\n");
    html
}

fn write_nav_ol(html: &mut String, entries: &[NavEntry]) {
    // Per-level state: whether a child <ol> was opened under this <li>.
    fn close(html: &mut String, has_children: bool) {
        if has_children {
            html.push_str("</ol>\n");
        }
        html.push_str("</li>\n");
    }

    let mut levels: Levels<bool> = Levels::new();
    html.push_str("<ol>\n");
    for entry in entries {
        while let Some(has_children) = levels.close_for(entry.depth) {
            close(html, has_children);
        }
        if let Some(has_children) = levels.parent_mut()
            && !*has_children
        {
            html.push_str("\n<ol>\n");
            *has_children = true;
        }
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a>",
            xml_escape(&entry.href),
            xml_escape(&entry.label())
        ));
        levels.open(entry.depth, false);
    }
    while let Some(has_children) = levels.close_any() {
        close(html, has_children);
    }
    html.push_str("</ol>\n");
}

/// Render the EPUB 2 NCX (`toc.ncx`).
pub fn render_ncx(entries: &[NavEntry], title: &str, uid: &str) -> String {
    let depth = entries.iter().map(|e| e.depth).max().unwrap_or(1);

    let mut ncx = String::new();
    ncx.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    ncx.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    ncx.push_str("<head>\n");
    ncx.push_str(&format!(
        "  <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        xml_escape(uid)
    ));
    ncx.push_str(&format!("  <meta name=\"dtb:depth\" content=\"{depth}\"/>\n"));
    ncx.push_str("</head>\n");
    ncx.push_str(&format!(
        "<docTitle><text>{}</text></docTitle>\n",
        xml_escape(title)
    ));
    ncx.push_str("<navMap>\n");

    let mut levels: Levels<()> = Levels::new();
    for (i, entry) in entries.iter().enumerate() {
        while levels.close_for(entry.depth).is_some() {
            ncx.push_str("</navPoint>\n");
        }
        let play_order = i + 1;
        ncx.push_str(&format!(
            "<navPoint id=\"navpoint-{play_order}\" playOrder=\"{play_order}\">\n"
        ));
        ncx.push_str(&format!(
            "  <navLabel><text>{}</text></navLabel>\n",
            xml_escape(&entry.label())
        ));
        ncx.push_str(&format!(
            "  <content src=\"{}\"/>\n",
            xml_escape(&entry.href)
        ));
        levels.open(entry.depth, ());
    }
    while levels.close_any().is_some() {
        ncx.push_str("</navPoint>\n");
    }

    ncx.push_str("</navMap>\n");
    ncx.push_str("</ncx>\n");
    ncx
}
