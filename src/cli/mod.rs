pub mod convert;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fbx", version, about = "Convert FictionBook (FB2) documents into EPUB packages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert an FB2 file to EPUB
    Convert(convert::ConvertArgs),
    /// Show the table of contents the conversion would produce
    Toc {
        /// Path to the FB2 file
        file: PathBuf,
        /// Maximum depth to display
        #[arg(long)]
        depth: Option<u32>,
    },
    /// List internal anchors and the pages they resolve to
    Anchors {
        /// Path to the FB2 file
        file: PathBuf,
    },
}
