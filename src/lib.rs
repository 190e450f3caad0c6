pub mod config;
pub mod epub;
pub mod error;
pub mod fb2;
pub mod metadata;
pub mod transcode;
pub mod util;

pub use config::ConvertOptions;
pub use error::{FbxError, LookupError, Phase, Result};
pub use fb2::anchors::{AnchorIndex, Destination, resolve as resolve_anchors};
pub use metadata::{BookRecord, Catalog, JsonCatalog};
pub use transcode::{ConversionReport, convert, outline_headings};

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Convert `input` into an EPUB at `output`.
///
/// The archive is written to a sibling temporary file and renamed into place
/// only when the conversion succeeds; on failure the temporary file is
/// removed and `output` is left untouched.
pub fn convert_file(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    catalog: Option<&dyn Catalog>,
) -> Result<ConversionReport> {
    let mut source = fb2::open_path(input)?;
    let tmp = temp_path(output);

    let result = (|| -> Result<ConversionReport> {
        let mut sink = BufWriter::new(File::create(&tmp)?);
        let report = convert(&mut source, &mut sink, options, catalog)?;
        sink.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(report)
    })();

    match result {
        Ok(report) => {
            std::fs::rename(&tmp, output)?;
            tracing::debug!(output = %output.display(), "wrote archive");
            Ok(report)
        }
        Err(err) => {
            if let Err(rm) = std::fs::remove_file(&tmp) {
                tracing::debug!(path = %tmp.display(), error = %rm, "could not remove temporary file");
            }
            Err(err)
        }
    }
}

fn temp_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    output.with_file_name(name)
}
