//! # FastIconv CLI - Streaming Character Encoding Converter
//!
//! Command-line interface over the conversion engine: converts files or
//! standard input between any two registered encodings, chunk by chunk.

#[cfg(feature = "cli")]
use std::fs::File;
#[cfg(feature = "cli")]
use std::io::{self, BufWriter, Read, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use serde::Serialize;
#[cfg(feature = "cli")]
use tracing::{debug, info};
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use fast_iconv::registry::EncodingInfo;
#[cfg(feature = "cli")]
use fast_iconv::{ConversionContext, ConvertFlags, Error as IconvError, Registry};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

/// FastIconv: resumable character encoding converter
#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "fast-iconv")]
#[command(version, about, long_about = None)]
#[command(author = "FastIconv Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Convert a file between character encodings
    Convert(ConvertArgs),

    /// List all supported encodings
    List(ListArgs),

    /// Display detailed information about an encoding
    Info(InfoArgs),
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ConvertArgs {
    /// Source encoding
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target encoding, optionally with //TRANSLIT or //IGNORE
    #[arg(short = 't', long = "to")]
    to: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Omit invalid characters from output
    #[arg(short = 'c')]
    discard: bool,

    /// Approximate characters the target cannot represent
    #[arg(long)]
    translit: bool,

    /// Write the target's replacement character for invalid input
    #[arg(long)]
    hide_invalid: bool,

    /// Report unconvertible characters as invalid input
    #[arg(long)]
    no_mapping_is_illegal: bool,

    /// Buffer size for reading and writing (KB)
    #[arg(long, default_value = "64")]
    buffer_size: usize,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct ListArgs {
    /// Show encoding details
    #[arg(long)]
    details: bool,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct InfoArgs {
    /// Encoding to describe
    encoding: String,
}

#[cfg(feature = "cli")]
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionResult {
    success: bool,
    from: String,
    to: String,
    flags: ConvertFlags,
    bytes_processed: usize,
    bytes_written: usize,
    invalid_characters: usize,
    processing_time_ms: u64,
}

/// Totals for one converted stream.
#[cfg(feature = "cli")]
#[derive(Debug, Default)]
struct StreamStats {
    read: usize,
    written: usize,
    invalid: usize,
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Convert(ref args) => convert_command(args, &cli)?,
        Commands::List(ref args) => list_command(args, &cli)?,
        Commands::Info(ref args) => info_command(args, &cli)?,
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

/// Describes a stopped conversion the way iconv(1) users expect.
#[cfg(feature = "cli")]
fn conversion_error(err: IconvError, offset: usize) -> anyhow::Error {
    anyhow::anyhow!("{}: {} at input byte offset {}", err.errno(), err, offset)
}

#[cfg(feature = "cli")]
fn convert_command(args: &ConvertArgs, cli: &Cli) -> Result<()> {
    let start_time = std::time::Instant::now();

    let desc = Registry::builtin()
        .open(&args.from, &args.to)
        .with_context(|| format!("Failed to open conversion from {} to {}", args.from, args.to))?;

    let defaults = desc.default_flags();
    let flags = ConvertFlags {
        discard_illegal: defaults.discard_illegal || args.discard,
        hide_invalid_in_output: defaults.hide_invalid_in_output || args.hide_invalid,
        translit: defaults.translit || args.translit,
        treat_no_mapping_as_illegal: defaults.treat_no_mapping_as_illegal || args.no_mapping_is_illegal,
    };
    info!(from = desc.from().name(), to = desc.to().name(), ?flags, "converting");
    if desc.is_trivial() {
        debug!("conversion is byte-for-byte identity");
    }

    let reader: Box<dyn Read> = match args.input {
        Some(ref path) => {
            info!(path = %path.display(), "reading input");
            Box::new(File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?)
        }
        None => Box::new(io::stdin().lock()),
    };
    let writer: Box<dyn Write> = match args.output {
        Some(ref path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let chunk = args.buffer_size.max(1) * 1024;
    let mut ctx = ConversionContext::new(desc.clone());
    let mut writer = BufWriter::with_capacity(chunk, writer);
    let stats = convert_stream(&mut ctx, reader, &mut writer, flags, chunk)?;
    writer.flush().context("Failed to flush output")?;

    let processing_time = start_time.elapsed();
    info!(read = stats.read, written = stats.written, invalid = stats.invalid, elapsed = ?processing_time, "done");

    match cli.format {
        OutputFormat::Json => {
            let result = ConversionResult {
                success: true,
                from: desc.from().name().to_string(),
                to: desc.to().name().to_string(),
                flags,
                bytes_processed: stats.read,
                bytes_written: stats.written,
                invalid_characters: stats.invalid,
                processing_time_ms: processing_time.as_millis() as u64,
            };
            eprintln!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if stats.invalid > 0 {
                eprintln!("{} invalid characters replaced or dropped", stats.invalid);
            }
            if cli.verbose || args.output.is_some() {
                eprintln!("✓ Conversion completed successfully");
            }
        }
    }

    Ok(())
}

/// Streams `reader` through `ctx` into `writer`, `chunk` bytes at a time.
///
/// A character split across reads is carried over to the next read. At end
/// of input a character left unfinished is reported or recovered per
/// `flags`, and the destination shift state is flushed.
#[cfg(feature = "cli")]
fn convert_stream(
    ctx: &mut ConversionContext,
    mut reader: impl Read,
    writer: &mut impl Write,
    flags: ConvertFlags,
    chunk: usize,
) -> Result<StreamStats> {
    let mut stats = StreamStats::default();
    let mut pending: Vec<u8> = Vec::with_capacity(chunk * 2);
    let mut out = vec![0u8; chunk.max(64)];
    let mut offset = 0;

    loop {
        let start = pending.len();
        pending.resize(start + chunk, 0);
        let n = reader.read(&mut pending[start..]).context("Failed to read input")?;
        pending.truncate(start + n);
        if n == 0 {
            break;
        }
        stats.read += n;

        let mut rest = &pending[..];
        loop {
            let room = out.len();
            let mut window = &mut out[..];
            let before = rest.len();
            let res = ctx.convert(&mut rest, &mut window, flags);
            offset += before - rest.len();
            let written = room - window.len();
            writer.write_all(&out[..written]).context("Failed to write output")?;
            stats.written += written;
            match res {
                Ok(invalid) => {
                    stats.invalid += invalid;
                    break;
                }
                Err(IconvError::OutputTooSmall) if written == 0 => out.resize(room * 2, 0),
                Err(IconvError::OutputTooSmall) => {}
                Err(IconvError::IncompleteSequence) => break,
                Err(err) => return Err(conversion_error(err, offset)),
            }
        }
        let consumed = pending.len() - rest.len();
        pending.drain(..consumed);
    }

    let (tail, invalid) = ctx.convert_all(&pending, flags).map_err(|err| conversion_error(err, offset))?;
    writer.write_all(&tail).context("Failed to write output")?;
    stats.written += tail.len();
    stats.invalid += invalid;
    Ok(stats)
}

#[cfg(feature = "cli")]
fn list_command(args: &ListArgs, cli: &Cli) -> Result<()> {
    let registry = Registry::builtin();
    let encodings = registry
        .names()
        .iter()
        .map(|name| registry.info(name))
        .collect::<fast_iconv::Result<Vec<EncodingInfo>>>()
        .context("Failed to describe registered encodings")?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&encodings)?);
        }
        OutputFormat::Text => {
            println!("Supported Encodings ({} total):", encodings.len());
            println!();

            for encoding in &encodings {
                println!("{:15} {}", encoding.name, encoding.aliases.join(", "));
                if args.details {
                    print_details(encoding, "                ");
                    println!();
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn info_command(args: &InfoArgs, cli: &Cli) -> Result<()> {
    let info = Registry::builtin()
        .info(&args.encoding)
        .with_context(|| format!("Unknown encoding: {}", args.encoding))?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Text => {
            println!("Encoding Information: {}", info.name);
            if !info.aliases.is_empty() {
                println!("Aliases: {}", info.aliases.join(", "));
            }
            print_details(&info, "");
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn print_details(info: &EncodingInfo, indent: &str) {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };
    println!("{indent}Charsets: {}", info.charsets.join(", "));
    println!("{indent}Unit Size: {} bytes", info.min_unit);
    println!("{indent}Stateful: {}", yes_no(info.stateful));
    println!("{indent}Wide: {}", yes_no(info.wide));
}
