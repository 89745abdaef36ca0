//! wiresight - Decode Protocol Buffer blobs from database columns
//!
//! This tool drives the wiresight decoding engine from the shell: list
//! the message types of a compiled descriptor set, wire-scan blobs
//! without a schema, or run the full mapping/inference/scan resolution
//! pipeline against a blob.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use wiresight_core::{
    decode, ColumnBinding, ColumnBindingResolver, DecodeOutcome, DecodeSource, Descriptor,
    FieldNode, FieldPayload, InferenceMode, LenPayload, MappingTable, RowValues,
    TypeInferenceEngine, WireScanner,
};

/// Decode Protocol Buffer blobs from database columns
#[derive(Parser, Debug)]
#[command(name = "wiresight")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the message types of a compiled descriptor set
    Types {
        /// Path to a serialized FileDescriptorSet (protoc --descriptor_set_out)
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Wire-scan blobs without a schema
    Scan {
        #[command(flatten)]
        input: BlobInput,

        /// Maximum nesting depth for the nested-message heuristic
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Run the full decode pipeline: mapping, inference, wire scan
    Decode {
        /// Path to a serialized FileDescriptorSet
        #[arg(short, long)]
        schema: PathBuf,

        #[command(flatten)]
        input: BlobInput,

        /// Decode as this exact type instead of resolving
        #[arg(short, long)]
        r#type: Option<String>,

        /// Path to a mapping-table CSV
        #[arg(long, requires_all = ["key", "value", "source"])]
        mapping: Option<PathBuf>,

        /// Mapping key column (the discriminator values)
        #[arg(long)]
        key: Option<String>,

        /// Mapping value column (the type labels)
        #[arg(long)]
        value: Option<String>,

        /// Host-table column carrying the discriminator
        #[arg(long)]
        source: Option<String>,

        /// Row values as column=value pairs, repeatable
        #[arg(long = "row")]
        rows: Vec<String>,

        /// Score all inference candidates instead of taking the first match
        #[arg(long)]
        best_match: bool,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct BlobInput {
    /// Path to a file containing the raw blob bytes
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// The blob as base64 text
    #[arg(short, long)]
    b64: Option<String>,

    /// Scan every file under a directory (scan only)
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON value trees
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Types { schema } => run_types(&cli, schema),
        Command::Scan { input, max_depth } => run_scan(&cli, input, *max_depth),
        Command::Decode {
            schema,
            input,
            r#type,
            mapping,
            key,
            value,
            source,
            rows,
            best_match,
        } => run_decode(
            &cli,
            schema,
            input,
            r#type.as_deref(),
            mapping.as_deref(),
            key.as_deref(),
            value.as_deref(),
            source.as_deref(),
            rows,
            *best_match,
        ),
    }
}

/// Load a descriptor set from disk
fn load_descriptor(path: &Path) -> Result<Descriptor> {
    let data = fs::read(path)
        .with_context(|| format!("Failed to read descriptor set: {}", path.display()))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("schema")
        .to_string();
    let descriptor = Descriptor::load(data, name)
        .with_context(|| format!("Failed to load descriptor set: {}", path.display()))?;
    Ok(descriptor)
}

/// Read blob bytes from the selected input mode
fn read_blob(input: &BlobInput) -> Result<Vec<u8>> {
    if let Some(file) = &input.file {
        fs::read(file).with_context(|| format!("Failed to read blob file: {}", file.display()))
    } else if let Some(b64) = &input.b64 {
        BASE64
            .decode(b64.trim())
            .context("Failed to decode base64 blob")
    } else {
        bail!("--directory is only supported by the scan command")
    }
}

fn run_types(cli: &Cli, schema: &Path) -> Result<()> {
    let descriptor = load_descriptor(schema)?;
    let names = descriptor.message_type_names();
    info!("{}: {} message types", descriptor.name(), names.len());

    match cli.format {
        OutputFormat::Text => {
            for name in names {
                println!("{name}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(names)?);
        }
    }
    Ok(())
}

fn run_scan(cli: &Cli, input: &BlobInput, max_depth: Option<usize>) -> Result<()> {
    let mut scanner = WireScanner::new();
    if let Some(depth) = max_depth {
        scanner = scanner.max_depth(depth);
    }

    if let Some(directory) = &input.directory {
        return scan_directory(cli, &scanner, directory);
    }

    let blob = read_blob(input)?;
    let outcome = scanner.scan(&blob);

    match cli.format {
        OutputFormat::Text => {
            print_field_tree(&outcome.fields, 0);
            if let Some(error) = &outcome.error {
                warn!("scan stopped early: {}", error);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.fields)?);
        }
    }

    if outcome.fields.is_empty() {
        if let Some(error) = outcome.error {
            bail!("blob is not valid wire data: {error}");
        }
    }
    Ok(())
}

/// Scan every file under a directory, skipping hidden files and
/// duplicate blobs
fn scan_directory(cli: &Cli, scanner: &WireScanner, directory: &Path) -> Result<()> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    let mut stats = ScanStats::default();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                continue;
            }
        };

        // Dedupe identical blobs across the tree
        if !seen.insert(*blake3::hash(&data).as_bytes()) {
            trace!("Skipping duplicate blob: {}", path.display());
            stats.duplicates_skipped += 1;
            continue;
        }

        stats.scanned += 1;
        let outcome = scanner.scan(&data);
        debug!(
            "{}: {} fields, complete: {}",
            path.display(),
            outcome.fields.len(),
            outcome.is_complete()
        );

        if outcome.fields.is_empty() {
            stats.undecodable += 1;
            println!("{}: not wire data", path.display());
            continue;
        }

        match cli.format {
            OutputFormat::Text => {
                println!(
                    "{}: {} top-level fields{}",
                    path.display(),
                    outcome.fields.len(),
                    if outcome.is_complete() {
                        ""
                    } else {
                        " (truncated)"
                    }
                );
                print_field_tree(&outcome.fields, 1);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&outcome.fields)?);
            }
        }
    }

    info!(
        "Summary: {} scanned, {} duplicates skipped, {} not wire data",
        stats.scanned, stats.duplicates_skipped, stats.undecodable
    );
    Ok(())
}

#[derive(Default)]
struct ScanStats {
    scanned: usize,
    duplicates_skipped: usize,
    undecodable: usize,
}

#[allow(clippy::too_many_arguments)]
fn run_decode(
    cli: &Cli,
    schema: &Path,
    input: &BlobInput,
    type_name: Option<&str>,
    mapping: Option<&Path>,
    key: Option<&str>,
    value: Option<&str>,
    source: Option<&str>,
    rows: &[String],
    best_match: bool,
) -> Result<()> {
    let descriptor = load_descriptor(schema)?;
    let blob = read_blob(input)?;

    // An explicit type bypasses resolution entirely
    if let Some(type_name) = type_name {
        let handle = descriptor.require(type_name)?;
        let message = decode::decode(&handle, &blob)
            .with_context(|| format!("Blob does not decode as {type_name}"))?;
        return print_decoded(cli, type_name, None, &message);
    }

    let binding = match mapping {
        Some(mapping_path) => {
            let csv_text = fs::read_to_string(mapping_path).with_context(|| {
                format!("Failed to read mapping table: {}", mapping_path.display())
            })?;
            let table_name = mapping_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("mapping");
            let table = MappingTable::parse(&csv_text, table_name)?.configure(
                key.expect("clap enforces --key with --mapping"),
                value.expect("clap enforces --value with --mapping"),
                source.expect("clap enforces --source with --mapping"),
            )?;
            debug!(
                "mapping table '{}' configured, {} rows",
                table.name(),
                table.rows().len()
            );
            Some(
                ColumnBinding::new("cli", "blob", descriptor.name())
                    .with_mapping(&table, &descriptor),
            )
        }
        None => None,
    };

    let row = parse_row_pairs(rows)?;
    let mode = if best_match {
        InferenceMode::BestMatch
    } else {
        InferenceMode::FirstMatch
    };
    let resolver = ColumnBindingResolver::with_engine(TypeInferenceEngine::with_mode(mode));

    let outcome = resolver.resolve(binding.as_ref(), Some(&descriptor), &row, &blob);

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if matches!(outcome, DecodeOutcome::Failed { .. }) {
                std::process::exit(1);
            }
            Ok(())
        }
        OutputFormat::Text => match outcome {
            DecodeOutcome::Decoded {
                type_name,
                source,
                message,
            } => print_decoded(cli, &type_name, Some(source), &message),
            DecodeOutcome::WireOnly { fields, error } => {
                println!("no schema matched; wire-level view:");
                print_field_tree(&fields, 1);
                if let Some(error) = error {
                    warn!("scan stopped early: {}", error);
                }
                Ok(())
            }
            DecodeOutcome::Failed { reason } => bail!("undecodable: {reason}"),
        },
    }
}

fn print_decoded(
    cli: &Cli,
    type_name: &str,
    source: Option<DecodeSource>,
    message: &wiresight_core::DecodedMessage,
) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(message)?);
        }
        OutputFormat::Text => {
            let via = match source {
                Some(DecodeSource::Mapping) => " (via mapping)",
                Some(DecodeSource::Inference) => " (via inference)",
                None => "",
            };
            println!("decoded as {type_name}{via}");
            println!("{}", serde_json::to_string_pretty(message)?);
        }
    }
    Ok(())
}

/// Parse repeated `column=value` arguments into row values
fn parse_row_pairs(pairs: &[String]) -> Result<RowValues> {
    let mut row = RowValues::new();
    for pair in pairs {
        let Some((column, value)) = pair.split_once('=') else {
            bail!("invalid --row '{pair}': expected column=value");
        };
        row.insert(column.to_string(), value.to_string());
    }
    Ok(row)
}

/// Render a scanned field tree with indentation
fn print_field_tree(fields: &[FieldNode], indent: usize) {
    let pad = "  ".repeat(indent);
    for field in fields {
        match &field.payload {
            FieldPayload::Varint(v) => {
                println!("{pad}#{}: varint {}", field.number, v);
            }
            FieldPayload::Fixed64(v) => {
                println!("{pad}#{}: fixed64 0x{v:016x}", field.number);
            }
            FieldPayload::Fixed32(v) => {
                println!("{pad}#{}: fixed32 0x{v:08x}", field.number);
            }
            FieldPayload::Len(LenPayload::Text(text)) => {
                println!("{pad}#{}: \"{}\"", field.number, text);
            }
            FieldPayload::Len(LenPayload::Message(nested)) => {
                println!("{pad}#{}: message ({} fields)", field.number, nested.len());
                print_field_tree(nested, indent + 1);
            }
            FieldPayload::Len(LenPayload::Opaque { len, preview }) => {
                println!("{pad}#{}: {} bytes [{}]", field.number, len, preview);
            }
        }
    }
}
