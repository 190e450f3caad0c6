use clap::Args;
use fbx::ConvertOptions;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Path to the FB2 file
    pub file: PathBuf,

    /// Output EPUB path (defaults to the input with an .epub extension)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// YAML file with conversion options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON catalog of book records, keyed by book id
    #[arg(long, env = "FBX_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Catalog key of this book
    #[arg(long)]
    pub book_id: Option<String>,

    /// CSS file replacing the built-in stylesheet
    #[arg(long)]
    pub stylesheet: Option<PathBuf>,

    /// Language used when neither the catalog nor the book declares one
    #[arg(long)]
    pub language: Option<String>,
}

impl ConvertArgs {
    /// Options from the config file (if any) with flags layered on top.
    pub fn options(&self) -> fbx::Result<ConvertOptions> {
        let mut options = match &self.config {
            Some(path) => ConvertOptions::load(path)?,
            None => ConvertOptions::default(),
        };
        if let Some(ref id) = self.book_id {
            options.book_id = Some(id.clone());
        }
        if let Some(ref css) = self.stylesheet {
            options.stylesheet = Some(css.clone());
        }
        if let Some(ref lang) = self.language {
            options.default_language = lang.clone();
        }
        Ok(options)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(&self.file))
    }
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("epub")
}
