use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use bz3_codecs::{codec_by_name, CODEC_NAMES};
use bz3_core::{
    clamp_block_size, Codec, DecodeOptions, Decoder, EncodeOptions, Encoder, Format, SegmentInfo,
    DEFAULT_BLOCK_SIZE,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "bz3",
    about = "Compress, decompress, and inspect BZ3v1 block containers",
    version
)]
struct Cli {
    /// Log framing decisions (repeat for per-block tracing)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Open-ended stream, 9-byte header
    File,
    /// Counted stream, 13-byte header
    Frame,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::File => Format::File,
            FormatArg::Frame => Format::Frame,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a BZ3v1 container
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination container ("-" writes stdout)
        output: PathBuf,
        /// Codec to use: passthrough | zstd | lz4 | deflate
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        /// Codec compression level (zstd and deflate only)
        #[arg(long)]
        level: Option<i32>,
        /// Original bytes per block (raised to 65 KiB when smaller)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
        #[arg(long, value_enum, default_value = "file")]
        format: FormatArg,
        /// Encode incrementally instead of reading the whole input first
        #[arg(long)]
        stream: bool,
    },
    /// Decompress a BZ3v1 container back to raw bytes
    Decompress {
        /// Source container ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes stdout)
        output: PathBuf,
        /// Codec the container was written with
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        /// Largest block size a header may declare
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        max_block_size: u32,
        #[arg(long, value_enum, default_value = "file")]
        format: FormatArg,
        /// Stop after the first segment instead of following appended ones
        #[arg(long)]
        no_concat: bool,
        /// Decode incrementally instead of reading the whole input first
        #[arg(long)]
        stream: bool,
    },
    /// Print segment headers and block statistics without decompressing
    Inspect {
        file: PathBuf,
        /// Codec the container was written with (used for size bounds)
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        max_block_size: u32,
        #[arg(long, value_enum, default_value = "file")]
        format: FormatArg,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
        /// Emit the segment list as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdin().lock()))
    } else {
        let file = File::open(path).with_context(|| format!("opening input file {:?}", path))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_output(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdout().lock()))
    } else {
        let file =
            File::create(path).with_context(|| format!("creating output file {:?}", path))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    open_input(path)?
        .read_to_end(&mut data)
        .with_context(|| format!("reading {:?}", path))?;
    Ok(data)
}

/// Counts bytes passing through a reader.
struct Counted<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for Counted<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Counts bytes passing through a writer.
struct CountedWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
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

fn print_summary(codec: &dyn Codec, raw: u64, packed: u64, elapsed_secs: f64) {
    let ratio = if packed == 0 { 0.0 } else { raw as f64 / packed as f64 };
    eprintln!("  codec       : {}", codec.name());
    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!("  compressed  : {}", human_bytes(packed));
    eprintln!("  ratio       : {:.2}x", ratio);
    if elapsed_secs > 0.0 {
        eprintln!(
            "  throughput  : {}/s",
            human_bytes((raw as f64 / elapsed_secs) as u64)
        );
    }
    eprintln!("  elapsed     : {:.3}s", elapsed_secs);
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    codec: Arc<dyn Codec>,
    options: EncodeOptions,
    stream: bool,
) -> anyhow::Result<()> {
    let t0 = Instant::now();

    let (raw, packed) = if stream {
        let mut src = Counted {
            inner: open_input(&input)?,
            count: 0,
        };
        let sink = CountedWriter {
            inner: open_output(&output)?,
            count: 0,
        };
        let mut encoder = Encoder::new(codec.clone(), sink, options)?;
        io::copy(&mut src, &mut encoder).context("encoding stream")?;
        let mut sink = encoder.finish()?;
        sink.flush()?;
        (src.count, sink.count)
    } else {
        let data = read_input(&input)?;
        let encoded = bz3_core::encode(codec.clone(), &data, &options)?;
        let mut dst = open_output(&output)?;
        dst.write_all(&encoded)?;
        dst.flush()?;
        (data.len() as u64, encoded.len() as u64)
    };

    let block_size = clamp_block_size(options.block_size)?;
    eprintln!("  block size  : {}", human_bytes(block_size as u64));
    print_summary(codec.as_ref(), raw, packed, t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: PathBuf,
    codec: Arc<dyn Codec>,
    options: DecodeOptions,
    stream: bool,
) -> anyhow::Result<()> {
    let t0 = Instant::now();

    let (raw, packed) = if stream {
        let src = Counted {
            inner: open_input(&input)?,
            count: 0,
        };
        let mut decoder = Decoder::new(codec.clone(), src, options)?;
        let mut dst = open_output(&output)?;
        let raw = io::copy(&mut decoder, &mut dst).context("decoding stream")?;
        dst.flush()?;
        let packed = decoder.get_ref().count;
        (raw, packed)
    } else {
        let data = read_input(&input)?;
        let decoded = bz3_core::decode(codec.clone(), &data, &options)
            .with_context(|| format!("decoding {:?}", input))?;
        let mut dst = open_output(&output)?;
        dst.write_all(&decoded)?;
        dst.flush()?;
        (decoded.len() as u64, data.len() as u64)
    };

    print_summary(codec.as_ref(), raw, packed, t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_inspect(
    file: PathBuf,
    codec: Arc<dyn Codec>,
    options: DecodeOptions,
    show_blocks: bool,
    json: bool,
) -> anyhow::Result<()> {
    let data = read_input(&file)?;
    let segments: Vec<SegmentInfo> = bz3_core::inspect(codec.as_ref(), &data, &options)
        .with_context(|| format!("scanning {:?}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
        return Ok(());
    }

    let raw: u64 = segments.iter().map(SegmentInfo::original_size).sum();
    let blocks: usize = segments.iter().map(|s| s.blocks.len()).sum();

    println!("=== BZ3v1 container: {:?} ===", file);
    println!();
    println!("  format         : {:?}", options.format);
    println!("  segments       : {}", segments.len());
    println!("  blocks         : {}", blocks);
    println!("  raw size       : {}", human_bytes(raw));
    println!("  file on disk   : {}", human_bytes(data.len() as u64));
    if !data.is_empty() {
        println!("  ratio          : {:.2}x", raw as f64 / data.len() as f64);
    }

    for (i, segment) in segments.iter().enumerate() {
        println!();
        println!(
            "  segment {} @ {}: block size {}, {} block(s){}",
            i,
            segment.offset,
            human_bytes(segment.header.block_size as u64),
            segment.blocks.len(),
            match segment.header.block_count {
                Some(n) => format!(" (header declares {})", n),
                None => String::new(),
            }
        );
        if show_blocks {
            println!(
                "  {:>8}  {:>14}  {:>12}  {:>12}",
                "block", "file offset", "packed", "original"
            );
            println!("  {}", "-".repeat(52));
            for (j, b) in segment.blocks.iter().enumerate() {
                println!(
                    "  {:>8}  {:>14}  {:>12}  {:>12}",
                    j,
                    b.offset,
                    human_bytes(b.packed_size as u64),
                    human_bytes(b.original_size as u64)
                );
            }
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            level,
            block_size,
            format,
            stream,
        } => {
            let codec = codec_by_name(&codec, level)
                .with_context(|| format!("valid codecs: {}", CODEC_NAMES.join(", ")))?;
            let options = EncodeOptions::default()
                .with_block_size(block_size)
                .with_format(format.into());
            run_compress(input, output, codec, options, stream)
        }
        Commands::Decompress {
            input,
            output,
            codec,
            max_block_size,
            format,
            no_concat,
            stream,
        } => {
            let codec = codec_by_name(&codec, None)?;
            let options = DecodeOptions::default()
                .with_max_block_size(max_block_size)
                .with_format(format.into())
                .with_concat(!no_concat);
            run_decompress(input, output, codec, options, stream)
        }
        Commands::Inspect {
            file,
            codec,
            max_block_size,
            format,
            blocks,
            json,
        } => {
            let codec = codec_by_name(&codec, None)?;
            let options = DecodeOptions::default()
                .with_max_block_size(max_block_size)
                .with_format(format.into());
            run_inspect(file, codec, options, blocks, json)
        }
    }
}
