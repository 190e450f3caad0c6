use std::io::{self, IsTerminal, Write};

pub struct OutputConfig {
    pub json: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
}

impl OutputConfig {
    pub fn from_global(json: bool, verbose: bool, quiet: bool, no_color: bool) -> Self {
        let no_color = no_color || std::env::var("NO_COLOR").is_ok() || !io::stdout().is_terminal();
        Self {
            json,
            verbose,
            quiet,
            no_color,
        }
    }

    /// Log filter for the tracing subscriber when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "fbx=debug"
        } else if self.quiet {
            "fbx=error"
        } else {
            "fbx=warn"
        }
    }

    /// Print a status/confirmation message (suppressed in quiet mode).
    pub fn status(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    /// Print extra detail (only shown in verbose mode, suppressed in quiet mode).
    pub fn detail(&self, msg: &str) {
        if self.verbose && !self.quiet {
            println!("{msg}");
        }
    }

    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    pub fn print_table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if rows.is_empty() {
            return;
        }

        let aligned = !self.no_color;
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        let line = |cells: &[String]| -> String {
            if aligned {
                cells
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| format!("{c:<w$}"))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            } else {
                cells.join("\t")
            }
        };

        let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        println!("{}", line(&header));
        if aligned {
            let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            println!("{}", sep.join("  "));
        }
        for row in rows {
            println!("{}", line(row));
        }
    }
}
