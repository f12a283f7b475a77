use clap::{Args, Parser, Subcommand};
use snaptar::{ArchiveOptions, Builder, CodecId, Compression, Info, Manifest};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snaptar", about = "Inspect and build container snapshot archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ArchiveArgs {
    /// Entry prefix the backup was written under
    #[arg(short, long, default_value = "")]
    prefix: String,
    /// Codec for packed blobs: gzip (default), zstd, none. Readers detect it per blob
    #[arg(short, long, default_value = "gzip")]
    codec: String,
    /// Compression level (gzip 0-9; zstd 1-22); codec default when omitted
    #[arg(short, long)]
    level: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store local files as volume blobs with a manifest and info record
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Engine version recorded in info.json
        #[arg(long, default_value = "")]
        docker_version: String,
        #[command(flatten)]
        archive: ArchiveArgs,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Print info.json
    Info {
        input: PathBuf,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
    /// Print manifest.json
    Manifest {
        input: PathBuf,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
    /// List indexed blobs with their header offsets
    Blobs {
        input: PathBuf,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
    /// Write a decoded blob to stdout
    Cat {
        input: PathBuf,
        /// Blob path or any suffix of it (e.g. the digest hex)
        blob: String,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, docker_version, archive, input } => {
            let opts = options(ArchiveOptions::write(&output), &archive)?;
            let mut b = Builder::open(opts)?;
            let w = b.writer()?;
            let mut item = Manifest::default();
            for path in &input {
                let data = std::fs::read(path)?;
                let blob = w.write_blob(&data)?;
                println!("  packed  {}  {}", path.display(), blob);
                item.volume.push(blob);
            }
            w.write_config_file("manifest.json", &[item])?;
            w.write_config_file("info.json", &Info::new(docker_version))?;
            b.close()?;
            println!("Created: {}", output.display());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, archive } => {
            let mut b = Builder::open(options(ArchiveOptions::read(&input), &archive)?)?;
            let info = b.reader()?.info()?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        // ── Manifest ─────────────────────────────────────────────────────────
        Commands::Manifest { input, archive } => {
            let mut b = Builder::open(options(ArchiveOptions::read(&input), &archive)?)?;
            let manifest = b.reader()?.manifest()?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }

        // ── Blobs ────────────────────────────────────────────────────────────
        Commands::Blobs { input, archive } => {
            let mut b = Builder::open(options(ArchiveOptions::read(&input), &archive)?)?;
            let r = b.reader()?;
            if let Err(e) = r.manifest() {
                eprintln!("warning: {e}");
            }
            println!("{:>12}  Name", "Offset");
            for blob in r.blobs() {
                println!("{:>12}  {}", blob.offset, blob.name);
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, blob, archive } => {
            let mut b = Builder::open(options(ArchiveOptions::read(&input), &archive)?)?;
            let r = b.reader()?;
            if let Err(e) = r.manifest() {
                eprintln!("warning: {e}");
            }
            let mut decoded = r.read_blobs_decoded(&blob)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            io::copy(&mut decoded, &mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn options(base: ArchiveOptions, args: &ArchiveArgs) -> Result<ArchiveOptions, Box<dyn std::error::Error>> {
    let codec = CodecId::from_name(&args.codec)
        .ok_or_else(|| format!("unknown codec '{}'", args.codec))?;
    let compression = match args.level {
        Some(level) => Compression::with_level(codec, level),
        None        => Compression::new(codec),
    };
    Ok(base.with_prefix(&args.prefix).with_compression(compression))
}
