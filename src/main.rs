use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cellout::config::Config;
use cellout::console::{append_output, collapse_console_outputs, truncate_outputs, OutputStream, OutputUnit};
use cellout::snippets::{LanguageKind, ParserRegistry};

/// Cellout - collapse notebook console output and parse cell snippets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collapse newline-delimited JSON output units
    Collapse {
        /// Read units from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Keep only the last N lines
        #[arg(short, long, allow_negative_numbers = true)]
        max_lines: Option<i64>,

        /// Print a snapshot after every unit
        #[arg(short, long)]
        stream: bool,
    },

    /// Show the inner-language view of a cell
    Snippet {
        /// File holding the cell source
        file: PathBuf,

        #[arg(short, long, value_enum, default_value_t = LanguageArg::Auto)]
        language: LanguageArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LanguageArg {
    Auto,
    Python,
    Markdown,
    Sql,
}

impl LanguageArg {
    fn kind(self) -> Option<LanguageKind> {
        match self {
            Self::Auto => None,
            Self::Python => Some(LanguageKind::Python),
            Self::Markdown => Some(LanguageKind::Markdown),
            Self::Sql => Some(LanguageKind::Sql),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let mut config = if let Some(config_path) = &args.config {
        Config::load_from_file(config_path)?
    } else {
        Config::load_default()?
    };

    match args.command {
        Command::Collapse {
            input,
            max_lines,
            stream,
        } => {
            if max_lines.is_some() {
                config.console.max_lines = max_lines;
            }
            match input {
                Some(path) => {
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    collapse(BufReader::new(file), &config, stream).await
                }
                None => collapse(BufReader::new(tokio::io::stdin()), &config, stream).await,
            }
        }
        Command::Snippet { file, language } => {
            let source = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            snippet(&config.snippets.registry(), &source, language)
        }
    }
}

async fn collapse<R>(reader: R, config: &Config, stream: bool) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let policy = config.console.truncation_policy();
    let mut lines = reader.lines();
    let mut units = Vec::new();
    let mut live = OutputStream::with_policy(policy.clone());
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let unit = match OutputUnit::from_json_line(&line) {
            Ok(unit) => unit,
            Err(e) => {
                warn!(line = line_number, error = %e, "skipping malformed output unit");
                continue;
            }
        };

        if !stream {
            units.push(unit);
        } else if config.console.stateful_streaming {
            live.push(unit);
            print_units(&live.snapshot())?;
        } else {
            units = append_output(&units, unit);
            print_units(&truncate_outputs(&units, &policy))?;
        }
    }

    if !stream {
        let collapsed = collapse_console_outputs(&units);
        info!(input = units.len(), output = collapsed.len(), "collapsed output units");
        print_units(&truncate_outputs(&collapsed, &policy))?;
    }
    Ok(())
}

fn print_units(units: &[OutputUnit]) -> Result<()> {
    let json = serde_json::to_string(units).context("Failed to serialize output units")?;
    println!("{json}");
    Ok(())
}

fn snippet(registry: &ParserRegistry, source: &str, language: LanguageArg) -> Result<()> {
    let language = language.kind().unwrap_or_else(|| registry.detect(source));
    let parsed = registry.transform_in_as(language, source);
    let report = serde_json::json!({
        "language": language,
        "code": parsed.code,
        "offset": parsed.offset,
        "metadata": parsed.metadata,
    });
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize snippet")?;
    println!("{json}");
    Ok(())
}
