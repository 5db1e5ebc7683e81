use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh3::xxh3_64;

use blockframe_codecs::{open_reader, Lz4Codec, PassThroughCodec, ZstdCodec};
use blockframe_core::format::{BLOCK_LEN_SIZE, HEADER_SIZE};
use blockframe_core::{Codec, Writer, WriterOptions, DEFAULT_BLOCK_SIZE};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "blockframe",
    about = "Streaming block compression: frame data into independently compressed blocks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a blockframe stream
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination stream ("-" writes to stdout)
        output: PathBuf,
        /// Codec to use: passthrough | zstd | lz4
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        /// Zstd compression level (1–22, only used with --codec zstd)
        #[arg(long, default_value_t = 3)]
        zstd_level: i32,
        /// Raw bytes per block (default: 32768 = 32 KB)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },
    /// Decompress a blockframe stream back to raw bytes
    Decompress {
        /// Source stream ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print header fields and block statistics
    Inspect {
        /// Stream to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn codec_from_name(name: &str, zstd_level: i32) -> anyhow::Result<Box<dyn Codec>> {
    match name {
        "passthrough" | "pass" | "none" => Ok(Box::new(PassThroughCodec)),
        "zstd" | "z" => Ok(Box::new(ZstdCodec::new(zstd_level))),
        "lz4" | "l" => Ok(Box::new(Lz4Codec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: passthrough, zstd, lz4",
            other
        ),
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening input file {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn create_output(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = File::create(path).with_context(|| format!("creating output file {:?}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn throughput(bytes: u64, secs: f64) -> String {
    if secs <= 0.0 {
        return "n/a".to_string();
    }
    format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    codec_name: &str,
    zstd_level: i32,
    block_size: usize,
) -> anyhow::Result<()> {
    let codec = codec_from_name(codec_name, zstd_level)?;
    let codec_display = codec.name();
    let options = WriterOptions { block_size };

    let mut src = open_input(&input)?;
    let dst = create_output(&output)?;
    let mut writer = Writer::with_options(dst, codec, &options)
        .with_context(|| format!("starting stream on {:?}", output))?;

    let t0 = Instant::now();
    io::copy(&mut src, &mut writer).with_context(|| format!("compressing {:?}", input))?;
    writer.close().context("closing output stream")?;
    let stats = writer.stats();
    let elapsed = t0.elapsed().as_secs_f64();
    info!(blocks = stats.blocks, raw_bytes = stats.raw_bytes, "compressed");

    let ratio = if stats.framed_bytes == 0 {
        1.0
    } else {
        stats.raw_bytes as f64 / stats.framed_bytes as f64
    };
    eprintln!("  codec       : {}", codec_display);
    eprintln!("  block size  : {}", human_bytes(block_size as u64));
    eprintln!("  blocks      : {}", stats.blocks);
    eprintln!("  raw size    : {}", human_bytes(stats.raw_bytes));
    eprintln!("  compressed  : {}", human_bytes(stats.framed_bytes));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  throughput  : {}", throughput(stats.raw_bytes, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let src = open_input(&input)?;
    let mut reader = open_reader(src).with_context(|| format!("reading header of {:?}", input))?;
    let mut dst = create_output(&output)?;

    let t0 = Instant::now();
    let total_raw = io::copy(&mut reader, &mut dst).with_context(|| format!("decompressing {:?}", input))?;
    dst.flush()?;
    let elapsed = t0.elapsed().as_secs_f64();
    info!(blocks = reader.blocks_read(), raw_bytes = total_raw, "decompressed");

    eprintln!("  codec       : {}", reader.codec().name());
    eprintln!("  blocks      : {}", reader.blocks_read());
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!("  throughput  : {}", throughput(total_raw, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

#[derive(Serialize)]
struct BlockReport {
    index: u64,
    compressed_len: usize,
    raw_len: usize,
    xxh3: String,
}

#[derive(Serialize)]
struct InspectReport {
    file: String,
    version: u32,
    min_compatible_version: u32,
    codec: &'static str,
    codec_id: u16,
    block_count: u64,
    raw_bytes: u64,
    compressed_bytes: u64,
    stream_bytes: u64,
    ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<BlockReport>>,
}

fn run_inspect(file: PathBuf, show_blocks: bool, json: bool) -> anyhow::Result<()> {
    let src = File::open(&file).with_context(|| format!("opening {:?}", file))?;
    let mut reader = open_reader(BufReader::new(src))?;
    let header = *reader.header();

    let mut block_count = 0u64;
    let mut raw_bytes = 0u64;
    let mut compressed_bytes = 0u64;
    let mut blocks = Vec::new();

    while let Some(raw_len) = reader.next_block()?.map(<[u8]>::len) {
        let payload = reader.payload();
        if show_blocks {
            blocks.push(BlockReport {
                index: block_count,
                compressed_len: payload.len(),
                raw_len,
                xxh3: format!("{:016x}", xxh3_64(payload)),
            });
        }
        block_count += 1;
        raw_bytes += raw_len as u64;
        compressed_bytes += payload.len() as u64;
    }

    let stream_bytes = HEADER_SIZE as u64 + block_count * BLOCK_LEN_SIZE as u64 + compressed_bytes;
    let report = InspectReport {
        file: file.display().to_string(),
        version: header.version,
        min_compatible_version: header.min_compatible_version,
        codec: reader.codec().name(),
        codec_id: header.codec_id,
        block_count,
        raw_bytes,
        compressed_bytes,
        stream_bytes,
        ratio: if stream_bytes == 0 { 1.0 } else { raw_bytes as f64 / stream_bytes as f64 },
        blocks: show_blocks.then_some(blocks),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== blockframe stream: {} ===", report.file);
    println!();
    println!("  format version : {} (min compatible {})", report.version, report.min_compatible_version);
    println!("  codec          : {} (id={})", report.codec, report.codec_id);
    println!("  block count    : {}", report.block_count);
    println!("  raw size       : {}", human_bytes(report.raw_bytes));
    println!("  compressed     : {}", human_bytes(report.compressed_bytes));
    println!("  stream size    : {}", human_bytes(report.stream_bytes));
    println!("  ratio          : {:.2}x", report.ratio);

    if let Some(blocks) = &report.blocks {
        println!();
        println!(
            "  {:>8}  {:>12}  {:>12}  {:>16}",
            "block", "compressed", "raw", "xxh3"
        );
        println!("  {}", "-".repeat(54));
        for b in blocks {
            println!(
                "  {:>8}  {:>12}  {:>12}  {}",
                b.index,
                human_bytes(b.compressed_len as u64),
                human_bytes(b.raw_len as u64),
                b.xxh3
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            zstd_level,
            block_size,
        } => run_compress(input, output, &codec, zstd_level, block_size),
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Inspect { file, blocks, json } => run_inspect(file, blocks, json),
    }
}
