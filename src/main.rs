use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sheetpack::data::join::{index_by, join};
use sheetpack::data::unpack::{into_mixed, MixedRow};
use sheetpack::data::{clean, output, parse, InputFormat, OutputFormat, Table};
use sheetpack::{Sheet, Unpacker};

pub static CONFIG_PATH: Lazy<Option<PathBuf>> =
    Lazy::new(|| dirs::config_dir().map(|path| path.join("sheetpack").join("columns.conf")));

#[derive(Parser)]
#[command(name = "sheetpack")]
struct Cli {
    #[arg(
        long = "input-format",
        short = 'i',
        default_value = "csv",
        help = "Input format: csv or json"
    )]
    format: String,

    #[arg(
        long = "header",
        default_value = "true",
        help = "Whether the CSV input has a header row"
    )]
    header: bool,

    #[arg(
        long = "column",
        short = 'c',
        help = "Column parser as KEY:PARSER (number, money, money(<symbol>), text). A lone KEY logs its parser. Repeatable."
    )]
    column: Vec<String>,

    #[arg(long = "config", help = "Path to an alternate column config file")]
    config: Option<PathBuf>,

    #[arg(long = "join", help = "Table to join onto every row, in the input format")]
    join: Option<PathBuf>,

    #[arg(long = "on", help = "Key of the input rows to join on")]
    on: Option<String>,

    #[arg(
        long = "join-on",
        help = "Key of the joined table to match against (defaults to --on)"
    )]
    join_on: Option<String>,

    #[arg(
        long = "join-as",
        default_value = "joined",
        help = "Field that receives the joined row"
    )]
    join_as: String,

    #[arg(
        long = "output-format",
        short = 'o',
        default_value = "plain",
        help = "Output format: cells, plain, or tsv"
    )]
    output_format: String,
}

pub fn main() {
    // Reset SIGPIPE to default so writing to a broken pipe exits cleanly
    // instead of panicking.
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sheetpack=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting sheetpack");
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let input_format = match cli.format.as_str() {
        "json" => InputFormat::Json,
        "csv" => InputFormat::Csv,
        other => return Err(anyhow!("Unknown input format: {other}. Valid formats: csv, json")),
    };

    let output_format = match cli.output_format.as_str() {
        "cells" => OutputFormat::Cells,
        "plain" => OutputFormat::Plain,
        "tsv" => OutputFormat::Tsv,
        other => {
            return Err(anyhow!(
                "Unknown output format: {other}. Valid formats: cells, plain, tsv"
            ))
        }
    };

    let table = parse::parse_stdin(input_format, cli.header).context("parsing input")?;
    info!(
        "Parsed table: {} rows, {} columns",
        table.rows.len(),
        table.num_columns()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if output_format == OutputFormat::Tsv {
        if cli.join.is_some() {
            warn!("--join is ignored for tsv output");
        }
        out.write_all(clean::table_to_tsv(&table)?.as_bytes())?;
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(|| (*CONFIG_PATH).clone());
    let sheet = match &config_path {
        Some(path) => {
            info!("Using column config : {:?}", path);
            Sheet::load(path)
        }
        None => Sheet::default(),
    };

    let mut unpacker = sheet.unpacker();
    for spec in &cli.column {
        let args: Vec<&str> = if spec.is_empty() {
            Vec::new()
        } else {
            spec.splitn(3, ':').collect()
        };
        match unpacker.column(&args)? {
            Some(parser) => info!("Column {:?} uses the {parser} parser", args[0]),
            None => info!("Column {:?} uses the default number parser", args[0]),
        }
    }

    let mut rows: Vec<MixedRow> = table
        .keyed_rows()
        .iter()
        .map(|row| into_mixed(unpacker.unpack(row)))
        .collect();

    if let Some(path) = &cli.join {
        join_file(&cli, path, input_format, &unpacker, &mut rows)?;
    }

    let order = column_order(&table, &sheet);
    for row in &rows {
        writeln!(out, "{}", output::format_row(row, &order, output_format)?)?;
    }

    Ok(())
}

fn join_file(
    cli: &Cli,
    path: &Path,
    format: InputFormat,
    unpacker: &Unpacker,
    rows: &mut [MixedRow],
) -> Result<()> {
    let on = cli
        .on
        .as_deref()
        .ok_or_else(|| anyhow!("--join needs --on <KEY>"))?;
    let join_on = cli.join_on.as_deref().unwrap_or(on);

    let other = parse::parse_file(path, format, true)?;
    // Same parsers as the input, so both sides type the key column alike.
    let other_rows = unpacker.repack_rows(&other.keyed_rows());

    let index = index_by(&other_rows, join_on);
    debug!("Indexed {} of {} joined rows by {join_on:?}", index.len(), other_rows.len());

    let matched = join(rows, on, &index, &cli.join_as);
    info!("Joined {matched} of {} rows on {on:?}", rows.len());
    Ok(())
}

/// Table keys first, then sheet columns the input did not have.
fn column_order(table: &Table, sheet: &Sheet) -> Vec<String> {
    let mut order = table.keys();
    for column in sheet.columns() {
        if !order.contains(&column.key) {
            order.push(column.key.clone());
        }
    }
    order
}
