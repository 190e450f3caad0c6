//! FictionBook 2 source handling.
//!
//! Both conversion passes read the document as a stream of `quick_xml`
//! events; nothing here builds a tree. A [`Source`] owns a rewindable
//! reader and hands out a fresh event reader positioned at offset zero for
//! each pass.

pub mod anchors;
pub mod outline;

use crate::error::{FbxError, Phase, Result};
use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::BytesStart;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// A rewindable FB2 byte source.
#[derive(Debug)]
pub struct Source<R> {
    inner: R,
}

impl<R: BufRead + Seek> Source<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Seek back to the start and return an event reader over the document.
    pub fn rewind(&mut self) -> Result<Reader<&mut R>> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(Reader::from_reader(&mut self.inner))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl Source<Cursor<Vec<u8>>> {
    /// Build an in-memory source, transcoding to UTF-8 when the document
    /// declares another encoding.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let encoding = detect_encoding(&bytes);
        Self::new(Cursor::new(to_utf8(bytes, encoding)))
    }
}

/// Backing reader for [`open_path`].
///
/// UTF-8 documents stream from disk. Anything else is decoded once into
/// memory and replayed for the second pass, since the event reader only
/// understands UTF-8.
#[derive(Debug)]
pub enum SourceFile {
    Streamed(BufReader<File>),
    Decoded(Cursor<Vec<u8>>),
}

impl Read for SourceFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceFile::Streamed(r) => r.read(buf),
            SourceFile::Decoded(r) => r.read(buf),
        }
    }
}

impl BufRead for SourceFile {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            SourceFile::Streamed(r) => r.fill_buf(),
            SourceFile::Decoded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            SourceFile::Streamed(r) => r.consume(amt),
            SourceFile::Decoded(r) => r.consume(amt),
        }
    }
}

impl Seek for SourceFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SourceFile::Streamed(r) => r.seek(pos),
            SourceFile::Decoded(r) => r.seek(pos),
        }
    }
}

/// Open an FB2 file as a rewindable source.
pub fn open_path(path: &Path) -> Result<Source<SourceFile>> {
    let mut file = BufReader::new(File::open(path)?);
    let encoding = detect_encoding(file.fill_buf()?);
    if encoding == UTF_8 {
        return Ok(Source::new(SourceFile::Streamed(file)));
    }
    tracing::debug!(encoding = encoding.name(), path = %path.display(), "decoding source into memory");
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Source::new(SourceFile::Decoded(Cursor::new(to_utf8(
        bytes, encoding,
    )))))
}

/// Work out the document encoding from a BOM or the XML declaration.
pub fn detect_encoding(head: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(head) {
        return encoding;
    }
    let head = &head[..head.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let decl_re = regex::Regex::new(r#"^\s*<\?xml[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("valid regex");
    decl_re
        .captures(&text)
        .and_then(|caps| Encoding::for_label(caps[1].as_bytes()))
        .unwrap_or(UTF_8)
}

fn to_utf8(bytes: Vec<u8>, encoding: &'static Encoding) -> Vec<u8> {
    if encoding == UTF_8 {
        return bytes;
    }
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        tracing::warn!(encoding = encoding.name(), "source contains undecodable bytes");
    }
    text.into_owned().into_bytes()
}

/// Local (namespace-free) element name.
pub(crate) fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Unescaped value of the attribute whose local name is `name`.
///
/// FB2 links use an `xlink` namespace under whatever prefix the document
/// picked (`l:href`, `xlink:href`), so the prefix is ignored.
pub(crate) fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == name.as_bytes() {
            Some(match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            })
        } else {
            None
        }
    })
}

/// Raw attribute value exactly as written in the source.
pub(crate) fn raw_attr(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

pub(crate) fn decode_error<R>(phase: Phase, reader: &Reader<R>, message: impl ToString) -> FbxError {
    FbxError::SourceDecode {
        phase,
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}
