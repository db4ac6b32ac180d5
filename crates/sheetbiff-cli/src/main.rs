//! sheetbiff CLI - BIFF8 record inspection tool

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sheetbiff::{
    AttachEvent, Book, CollectingObserver, ContainerId, LoadOptions, ProtectionAspect,
    RecordStore,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetbiff")]
#[command(author, version, about = "Inspect the record stream of legacy .xls workbooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List records with their type codes and payload lengths
    Records {
        /// Input .xls file
        input: PathBuf,

        /// Only this sheet (0-based); the globals are listed when omitted
        #[arg(short, long)]
        sheet: Option<usize>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Show book and sheet protection state
    Protection {
        /// Input .xls file
        input: PathBuf,

        /// Print a JSON summary instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the attach-time events raised while loading
    Events {
        /// Input .xls file
        input: PathBuf,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// List all sheets in a workbook
    Sheets {
        /// Input .xls file
        input: PathBuf,
    },
}

#[derive(Args)]
struct LoadArgs {
    /// Keep MULRK / MULBLANK runs compressed
    #[arg(long)]
    no_expand: bool,

    /// Leave malformed runs compressed instead of failing
    #[arg(long)]
    lenient: bool,

    /// Do not report marker records (OBPROJ, EXCEL9FILE)
    #[arg(long)]
    no_markers: bool,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions::new()
            .with_expand_mul_records(!self.no_expand)
            .with_strict(!self.lenient)
            .with_observe_markers(!self.no_markers)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Records { input, sheet, load } => list_records(&input, sheet, &load.options()),
        Commands::Protection { input, json } => show_protection(&input, json),
        Commands::Events { input, load } => show_events(&input, &load.options()),
        Commands::Sheets { input } => list_sheets(&input),
    }
}

fn open(input: &Path, options: &LoadOptions) -> Result<(Book, CollectingObserver)> {
    let mut observer = CollectingObserver::new();
    let book = Book::open_with(input, options, &mut observer)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    Ok((book, observer))
}

fn print_records(store: &RecordStore) {
    for (handle, record) in store.iter() {
        println!(
            "{:>6}\t0x{:04X}\t{:<14}\t{}",
            handle.index(),
            record.type_code(),
            record.kind().name(),
            record.len()
        );
    }
}

fn list_records(input: &Path, sheet: Option<usize>, options: &LoadOptions) -> Result<()> {
    let (book, _) = open(input, options)?;

    match sheet {
        Some(idx) => {
            let sheet = book
                .sheet(idx)
                .with_context(|| format!("Sheet index {} not found", idx))?;
            println!("# {} \"{}\"", sheet.id(), sheet.name());
            print_records(sheet.records());
            let retired = sheet.retired_groups().len();
            if retired > 0 {
                eprintln!("Expanded {} compressed run(s)", retired);
            }
        }
        None => {
            println!("# {}", ContainerId::Book);
            print_records(book.records());
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ContainerProtection {
    container: ContainerId,
    name: Option<String>,
    aspects: BTreeMap<ProtectionAspect, bool>,
}

fn show_protection(input: &Path, json: bool) -> Result<()> {
    let (book, _) = open(input, &LoadOptions::default())?;

    let mut summary = vec![ContainerProtection {
        container: ContainerId::Book,
        name: None,
        aspects: book.protection().snapshot(book.records()),
    }];
    for sheet in book.sheets() {
        summary.push(ContainerProtection {
            container: sheet.id(),
            name: Some(sheet.name().to_string()),
            aspects: sheet.protection().snapshot(sheet.records()),
        });
    }

    if json {
        let text = serde_json::to_string_pretty(&summary).context("Failed to encode JSON")?;
        println!("{}", text);
        return Ok(());
    }

    for entry in &summary {
        match &entry.name {
            Some(name) => println!("{} \"{}\"", entry.container, name),
            None => println!("{}", entry.container),
        }
        if entry.aspects.is_empty() {
            println!("    (no protection records)");
        }
        for (aspect, value) in &entry.aspects {
            println!("    {:<18}{}", format!("{:?}", aspect), value);
        }
    }

    Ok(())
}

fn show_events(input: &Path, options: &LoadOptions) -> Result<()> {
    let (_, observer) = open(input, options)?;

    for event in &observer.events {
        match event {
            AttachEvent::Registered {
                container,
                handle,
                type_code,
                collection,
            } => println!(
                "{container}: #{} 0x{type_code:04X} registered in {collection:?}",
                handle.index()
            ),
            AttachEvent::Protection {
                container,
                handle,
                aspect,
            } => println!("{container}: #{} backs {aspect:?}", handle.index()),
            AttachEvent::Marker {
                container,
                property,
            } => println!("{container}: {}", property.description()),
            AttachEvent::Expanded {
                container,
                record_type,
                row,
                start_index,
                count,
            } => println!(
                "{container}: 0x{record_type:04X} row {row} expanded into {count} cell(s) from column {start_index}"
            ),
            AttachEvent::Closed { container } => println!("{container}: closed"),
        }
    }

    Ok(())
}

fn list_sheets(input: &Path) -> Result<()> {
    let (book, _) = open(input, &LoadOptions::default())?;
    let entries = book
        .bound_sheets()
        .context("Failed to decode BOUNDSHEET records")?;

    for (i, sheet) in book.sheets().iter().enumerate() {
        let visibility = match entries.get(i).map(|e| e.visibility) {
            Some(1) => "hidden",
            Some(2) => "very hidden",
            _ => "visible",
        };
        println!("{}\t{}\t{}", i, sheet.name(), visibility);
    }

    Ok(())
}
