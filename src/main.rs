mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::output::OutputConfig;
use cli::{Cli, Command};
use fbx::{Catalog, JsonCatalog};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Format a byte count as a human-readable size string.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = OutputConfig::from_global(cli.json, cli.verbose, cli.quiet, cli.no_color);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!output.no_color)
        .init();

    match cli.command {
        Command::Convert(args) => handle_convert(args, &output)?,
        Command::Toc { file, depth } => handle_toc(&file, depth, &output)?,
        Command::Anchors { file } => handle_anchors(&file, &output)?,
    }

    Ok(())
}

fn handle_convert(args: cli::convert::ConvertArgs, output: &OutputConfig) -> Result<()> {
    let options = args.options().context("failed to load conversion options")?;
    let catalog = match &args.catalog {
        Some(path) => Some(
            JsonCatalog::load(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?,
        ),
        None => None,
    };
    let out_path = args.output_path();

    let report = fbx::convert_file(
        &args.file,
        &out_path,
        &options,
        catalog.as_ref().map(|c| c as &dyn Catalog),
    )
    .with_context(|| format!("failed to convert {}", args.file.display()))?;

    if output.json {
        output.print_json(&serde_json::json!({
            "output": out_path,
            "title": report.metadata.title,
            "identifier": report.metadata.identifier,
            "pages": report.pages,
            "assets": report.assets,
            "nav_entries": report.nav.len(),
            "anchors": report.anchors.len(),
        }))?;
    } else {
        output.status(&format!("Wrote {}", out_path.display()));
        output.detail(&format!("Title:    {}", report.metadata.title));
        output.detail(&format!("Pages:    {}", report.pages.len()));
        output.detail(&format!("TOC:      {} entries", report.nav.len()));
        output.detail(&format!("Assets:   {}", report.assets.len()));
        output.detail(&format!("Anchors:  {}", report.anchors.len()));
        if let Ok(meta) = std::fs::metadata(&out_path) {
            output.detail(&format!("Size:     {}", format_size(meta.len())));
        }
    }
    Ok(())
}

fn handle_toc(file: &Path, depth: Option<u32>, output: &OutputConfig) -> Result<()> {
    let mut source = fbx::fb2::open_path(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let nav = fbx::outline_headings(&mut source)
        .with_context(|| format!("failed to read headings from {}", file.display()))?;
    let nav: Vec<_> = nav
        .into_iter()
        .filter(|n| depth.is_none_or(|d| n.depth <= d))
        .collect();

    if output.json {
        output.print_json(&nav)?;
    } else {
        let rows: Vec<Vec<String>> = nav
            .iter()
            .map(|n| {
                let indent = "  ".repeat(n.depth.saturating_sub(1) as usize);
                vec![n.order.to_string(), format!("{indent}{}", n.label()), n.href.clone()]
            })
            .collect();
        output.print_table(&["ORDER", "TITLE", "HREF"], &rows);
        output.detail(&format!("\n{} entries", nav.len()));
    }
    Ok(())
}

fn handle_anchors(file: &Path, output: &OutputConfig) -> Result<()> {
    let mut source = fbx::fb2::open_path(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let index = fbx::resolve_anchors(&mut source)
        .with_context(|| format!("failed to resolve anchors in {}", file.display()))?;

    if output.json {
        output.print_json(&index)?;
    } else {
        let rows: Vec<Vec<String>> = index
            .iter()
            .map(|(anchor, dest)| vec![anchor.to_string(), dest.href()])
            .collect();
        output.print_table(&["ANCHOR", "DESTINATION"], &rows);
        output.detail(&format!("\n{} anchors", index.len()));
    }
    Ok(())
}
