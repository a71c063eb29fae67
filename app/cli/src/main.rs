use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use logpack_compression::{
    plan_query, Archive, LogCompressor, ParserConfig, Schema, SearchConfig, TokenizationMode,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Logpack compression and search tool for unstructured log files
#[derive(Parser)]
#[command(name = "logpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a log file into a logpack archive
    Compress {
        /// Input log file (use '-' for stdin)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: String,

        /// Output archive file (use '-' for stdout)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        output: String,

        /// Schema file; omit to use the heuristic tokenizer
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Use the built-in standard schema instead of a schema file
        #[arg(long, conflicts_with = "schema")]
        standard_schema: bool,

        /// Messages per archive segment
        #[arg(long, value_name = "N")]
        segment_size: Option<usize>,
    },

    /// Decompress a logpack archive back to its original text
    Decompress {
        /// Input archive file (use '-' for stdin)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: String,

        /// Output log file (use '-' for stdout)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        output: String,
    },

    /// Search a logpack archive with a wildcard query
    Search {
        /// Archive file to search
        #[arg(short, long, value_name = "FILE")]
        archive: String,

        /// Search string; '*' matches any run, '?' any character
        query: String,

        /// Schema file the archive was compressed with (schema archives)
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Use the built-in standard schema instead of a schema file
        #[arg(long, conflicts_with = "schema")]
        standard_schema: bool,

        /// Match without regard to case
        #[arg(short, long)]
        ignore_case: bool,
    },

    /// Display information about a logpack archive
    Info {
        /// Archive file (use '-' for stdin)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Compress {
            input,
            output,
            schema,
            standard_schema,
            segment_size,
        } => compress_command(
            &input,
            &output,
            schema,
            standard_schema,
            segment_size,
            cli.quiet,
        ),
        Commands::Decompress { input, output } => decompress_command(&input, &output),
        Commands::Search {
            archive,
            query,
            schema,
            standard_schema,
            ignore_case,
        } => search_command(&archive, &query, schema, standard_schema, ignore_case),
        Commands::Info { input } => info_command(&input),
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path))
    }
}

fn write_output(path: &str, content: &str) -> Result<()> {
    if path == "-" {
        io::stdout()
            .write_all(content.as_bytes())
            .context("failed to write to stdout")
    } else {
        fs::write(path, content).with_context(|| format!("failed to write '{}'", path))
    }
}

fn load_schema(schema: Option<PathBuf>, standard_schema: bool) -> Result<Option<Schema>> {
    if let Some(path) = schema {
        let schema = Schema::load_from_file(&path)
            .with_context(|| format!("failed to load schema '{}'", path.display()))?;
        return Ok(Some(schema));
    }
    if standard_schema {
        return Ok(Some(Schema::standard()));
    }
    Ok(None)
}

fn compress_command(
    input: &str,
    output: &str,
    schema: Option<PathBuf>,
    standard_schema: bool,
    segment_size: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let schema = load_schema(schema, standard_schema)?;
    let content = read_input(input)?;

    let mut config = ParserConfig::new();
    if let Some(size) = segment_size {
        config = config.with_segment_size(size);
    }
    let compressor = LogCompressor::with_config(config);

    let progress = if quiet || output == "-" {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("compressing {}", input));
        bar
    };

    let start = Instant::now();
    let archive = match &schema {
        Some(schema) => compressor.compress_with_schema(schema, content.as_bytes())?,
        None => compressor.compress_heuristic(&content),
    };
    let elapsed = start.elapsed();
    progress.finish_and_clear();

    let json = archive.to_json()?;
    write_output(output, &json)?;

    let snapshot = compressor.stats().snapshot();
    debug!(
        "compressed {} bytes in {:.2?}",
        content.len(),
        elapsed
    );
    info!(
        "{} messages, {} logtypes, {} dictionary variables",
        snapshot.messages, snapshot.logtypes, snapshot.var_dict_entries
    );
    if !quiet && output != "-" {
        let ratio = content.len() as f64 / json.len().max(1) as f64;
        eprintln!(
            "compressed {} -> {} ({} messages, {} logtypes, ratio {:.2})",
            input, output, snapshot.messages, snapshot.logtypes, ratio
        );
    }
    Ok(())
}

fn decompress_command(input: &str, output: &str) -> Result<()> {
    let json = read_input(input)?;
    let archive = Archive::from_json(&json)?;
    let mut content = String::new();
    for index in 0..archive.num_messages() {
        let message = archive
            .decompress_message(index)
            .with_context(|| format!("failed to decode message {}", index))?;
        content.push_str(&message);
    }
    write_output(output, &content)
}

fn search_command(
    archive_path: &str,
    query_string: &str,
    schema: Option<PathBuf>,
    standard_schema: bool,
    ignore_case: bool,
) -> Result<()> {
    let json = read_input(archive_path)?;
    let archive = Archive::from_json(&json)?;
    let schema = load_schema(schema, standard_schema)?;
    if archive.mode() == TokenizationMode::Schema && schema.is_none() {
        bail!("this archive was compressed with a schema; pass --schema or --standard-schema");
    }

    let config = SearchConfig::new().with_ignore_case(ignore_case);
    let query = plan_query(&archive, query_string, &config, schema.as_ref())?;
    debug!(
        "planned {} subqueries (matches_all: {})",
        query.subqueries().len(),
        query.matches_all()
    );

    let matches = archive.find_matches(&query)?;
    let mut stdout = io::stdout().lock();
    for (_, text) in &matches {
        if text.ends_with('\n') {
            write!(stdout, "{}", text)?;
        } else {
            writeln!(stdout, "{}", text)?;
        }
    }
    info!("{} matching messages", matches.len());
    Ok(())
}

fn info_command(input: &str) -> Result<()> {
    let json = read_input(input)?;
    let archive = Archive::from_json(&json)?;
    let mode = match archive.mode() {
        TokenizationMode::Heuristic => "heuristic",
        TokenizationMode::Schema => "schema",
    };
    let dict_entries: usize = archive.var_dicts().iter().map(|d| d.len()).sum();
    println!("mode:                 {}", mode);
    println!("messages:             {}", archive.num_messages());
    println!("logtypes:             {}", archive.logtype_dict().len());
    println!("dictionary variables: {}", dict_entries);
    Ok(())
}
