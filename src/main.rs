//! Command line front end: convert XML dumps to claim triples and
//! aggregate triples into a property correlation table.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use claimstream::{
    CorrelationTable, DumpInput, EntityReader, ParallelReader, TripleFormat, TripleReader,
    TripleWriter,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "claimstream")]
#[command(about = "Extract claim triples and property statistics from Wikibase XML dumps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an XML dump into line-oriented claim triples
    Convert {
        /// The XML dump file; gzip input is detected by a .gz suffix
        input: PathBuf,

        /// The triple output file (stdout when omitted)
        output: Option<PathBuf>,

        /// Write grouped output where every entity id appears only once
        #[arg(short, long)]
        compressed: bool,

        /// Number of worker threads; 1 parses on the calling thread
        #[arg(short, long, default_value_t = 4)]
        processes: usize,

        /// Field separator
        #[arg(short, long, default_value_t = ',')]
        separator: char,
    },

    /// Generate a property correlation table from a triple file
    Table {
        /// The triple input file produced by convert
        input: PathBuf,

        /// Field separator
        #[arg(short, long, default_value_t = ',')]
        separator: char,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Convert {
            input,
            output,
            compressed,
            processes,
            separator,
        } => convert(input, output, compressed, processes, separator),
        Commands::Table { input, separator } => build_table(input, separator),
    }
}

fn convert(
    input: PathBuf,
    output: Option<PathBuf>,
    compressed: bool,
    processes: usize,
    separator: char,
) -> Result<()> {
    let start = Instant::now();

    let source = DumpInput::open(&input)
        .with_context(|| format!("cannot open dump {}", input.display()))?;
    let sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let format = if compressed {
        TripleFormat::Grouped
    } else {
        TripleFormat::Flat
    };
    let mut writer = TripleWriter::new(sink)
        .with_format(format)
        .with_separator(separator);

    let mut entities = 0u64;
    if processes <= 1 {
        for result in EntityReader::new(source) {
            let entity = result?;
            writer.write_entity(&entity)?;
            entities += 1;
        }
    } else {
        for result in ParallelReader::new(source, processes) {
            let entity = result?;
            writer.write_entity(&entity)?;
            entities += 1;
        }
    }
    writer.flush()?;

    info!("converted {} entities", entities);
    info!("total time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn build_table(input: PathBuf, separator: char) -> Result<()> {
    let start = Instant::now();

    let reader = TripleReader::from_path(&input)
        .with_context(|| format!("cannot open {}", input.display()))?
        .with_separator(separator);

    let mut table = CorrelationTable::new();
    let mut entities = 0u64;
    for result in reader {
        let entity = result?;
        table.add_entity(&entity);
        entities += 1;
    }

    info!(
        "aggregated {} entities over {} properties",
        entities,
        table.len()
    );
    info!("total time: {:.2}s", start.elapsed().as_secs_f64());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write!(out, "{}", table)?;
    out.flush()?;
    Ok(())
}
