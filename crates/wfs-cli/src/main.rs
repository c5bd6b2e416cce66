#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::env;
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wfs_core::{BlockTableStats, EntryKind, FsOps, IntegrityReport, OpenOptions, WfsImage};
use wfs_fuse::MountOptions;
use wfs_types::{N_BLOCKS, total_image_size};

/// Bytes fetched per read when streaming a file to stdout.
const CAT_CHUNK: u64 = 64 * 1024;

// ── Argument parsing ────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    positional: Vec<String>,
    json: bool,
    skip_validation: bool,
    allow_other: bool,
    offset: Option<u64>,
    length: Option<u64>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut out = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => out.json = true,
                "--skip-validation" => out.skip_validation = true,
                "--allow-other" => out.allow_other = true,
                "--offset" => out.offset = Some(parse_number("--offset", args.next())?),
                "--length" => out.length = Some(parse_number("--length", args.next())?),
                flag if flag.starts_with("--") => bail!("unknown flag: {flag}"),
                _ => out.positional.push(arg),
            }
        }
        Ok(out)
    }

    /// Exactly `N` positional arguments, or a usage error naming `usage`.
    fn positionals<const N: usize>(&self, usage: &str) -> Result<[&str; N]> {
        if self.positional.len() != N {
            bail!("usage: wfs {usage}");
        }
        let mut out = [""; N];
        for (slot, arg) in out.iter_mut().zip(&self.positional) {
            *slot = arg.as_str();
        }
        Ok(out)
    }

    fn open_options(&self) -> OpenOptions {
        OpenOptions {
            skip_validation: self.skip_validation,
        }
    }
}

fn parse_number(flag: &str, value: Option<String>) -> Result<u64> {
    let Some(value) = value else {
        bail!("{flag} requires a value");
    };
    value
        .parse()
        .with_context(|| format!("{flag}: invalid number {value:?}"))
}

// ── Entry point ─────────────────────────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    init_logging();
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    if matches!(command.as_str(), "--help" | "-h" | "help") {
        print_usage();
        return Ok(());
    }

    let args = Args::parse(args)?;
    let mut stdout = io::stdout().lock();
    match command.as_str() {
        "inspect" => {
            let [image] = args.positionals::<1>("inspect <image> [--json] [--skip-validation]")?;
            inspect(&mut stdout, &open_image(image, &args)?, args.json)
        }
        "ls" => {
            let [image, path] = args.positionals::<2>("ls <image> <path> [--json]")?;
            ls(&mut stdout, &open_image(image, &args)?, path, args.json)
        }
        "stat" => {
            let [image, path] = args.positionals::<2>("stat <image> <path> [--json]")?;
            stat(&mut stdout, &open_image(image, &args)?, path, args.json)
        }
        "cat" => {
            let [image, path] = args.positionals::<2>("cat <image> <path> [--offset N] [--length N]")?;
            cat(
                &mut stdout,
                &open_image(image, &args)?,
                path,
                args.offset.unwrap_or(0),
                args.length,
            )
        }
        "verify" => {
            let [image] = args.positionals::<1>("verify <image> [--json]")?;
            verify(&mut stdout, &open_image(image, &args)?, args.json)
        }
        "mount" => {
            let [image, mountpoint] = args.positionals::<2>("mount <image> <mountpoint> [--allow-other]")?;
            mount_cmd(image, Path::new(mountpoint), &args)
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("wfs\n");
    println!("USAGE:");
    println!("  wfs inspect <image> [--json]");
    println!("  wfs ls <image> <path> [--json]");
    println!("  wfs stat <image> <path> [--json]");
    println!("  wfs cat <image> <path> [--offset N] [--length N]");
    println!("  wfs verify <image> [--json]");
    println!("  wfs mount <image> <mountpoint> [--allow-other]");
    println!();
    println!("  --skip-validation  open images with a bad magic or short length");
    println!("  RUST_LOG           log filter (default: warn)");
}

fn open_image(path: &str, args: &Args) -> Result<WfsImage> {
    WfsImage::open_with_options(path, &args.open_options())
        .with_context(|| format!("failed to open WFS image: {path}"))
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    writeln!(out, "{text}")?;
    Ok(())
}

fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Directory => "dir",
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InspectOutput {
    image_bytes: u64,
    expected_bytes: u64,
    data_blocks: u64,
    root_entries: usize,
    table: BlockTableStats,
}

fn inspect(out: &mut impl Write, image: &WfsImage, json: bool) -> Result<()> {
    let root = image.resolve("/")?;
    let output = InspectOutput {
        image_bytes: image.device().len_bytes(),
        expected_bytes: total_image_size(),
        data_blocks: N_BLOCKS,
        root_entries: image.scanner().count(&root)?,
        table: image.block_table_stats()?,
    };

    if json {
        return print_json(out, &output);
    }
    writeln!(out, "WFS Inspector")?;
    writeln!(out, "image_bytes: {}", output.image_bytes)?;
    writeln!(out, "expected_bytes: {}", output.expected_bytes)?;
    writeln!(out, "data_blocks: {}", output.data_blocks)?;
    writeln!(out, "root_entries: {}", output.root_entries)?;
    writeln!(out, "blocks_free: {}", output.table.free)?;
    writeln!(out, "blocks_allocated: {}", output.table.allocated())?;
    writeln!(out, "blocks_invalid: {}", output.table.invalid)?;
    Ok(())
}

fn ls(out: &mut impl Write, image: &WfsImage, path: &str, json: bool) -> Result<()> {
    let dir = image
        .resolve(path)
        .with_context(|| format!("cannot resolve {path}"))?;
    let entries = image
        .list_directory(&dir)
        .with_context(|| format!("cannot list {path}"))?;

    if json {
        return print_json(out, &entries);
    }
    for entry in &entries {
        writeln!(
            out,
            "{:<4} {:>10}  {}",
            kind_label(entry.kind),
            entry.size,
            entry.name
        )?;
    }
    Ok(())
}

fn stat(out: &mut impl Write, image: &WfsImage, path: &str, json: bool) -> Result<()> {
    let resolved = image
        .resolve_located(path)
        .with_context(|| format!("cannot resolve {path}"))?;
    let attr = image.attr_for(&resolved);
    let entry = resolved.entry();

    if json {
        return print_json(out, &attr);
    }
    writeln!(out, "path: {path}")?;
    writeln!(out, "inode: {}", attr.ino.0)?;
    writeln!(out, "kind: {}", kind_label(image.get_attributes(&entry).kind))?;
    writeln!(out, "size: {}", attr.size)?;
    writeln!(out, "blocks: {}", attr.blocks)?;
    writeln!(out, "mode: {:o}", attr.perm)?;
    writeln!(out, "nlink: {}", attr.nlink)?;
    writeln!(out, "start_block: {}", entry.start_block)?;
    Ok(())
}

fn cat(
    out: &mut impl Write,
    image: &WfsImage,
    path: &str,
    offset: u64,
    length: Option<u64>,
) -> Result<()> {
    let entry = image
        .resolve(path)
        .with_context(|| format!("cannot resolve {path}"))?;
    let size = u64::from(entry.size_bytes());
    let mut remaining = length.unwrap_or(u64::MAX);
    let mut pos = offset;

    // The first read also rejects offsets past the end.
    loop {
        let chunk = image
            .read(&entry, pos, remaining.min(CAT_CHUNK))
            .with_context(|| format!("read {path} at offset {pos}"))?;
        if chunk.is_empty() {
            break;
        }
        out.write_all(&chunk)?;
        let n = chunk.len() as u64;
        pos += n;
        remaining -= n;
        if remaining == 0 || pos >= size {
            break;
        }
    }
    out.flush()?;
    Ok(())
}

fn verify(out: &mut impl Write, image: &WfsImage, json: bool) -> Result<()> {
    let report: IntegrityReport = image.verify().context("verify image")?;
    if json {
        print_json(out, &report)?;
    } else {
        writeln!(
            out,
            "directories: {}  files: {}  referenced_blocks: {}  orphaned_blocks: {}",
            report.directories, report.files, report.referenced_blocks, report.orphaned_blocks
        )?;
        for finding in &report.findings {
            writeln!(out, "{}: {:?}", finding.path, finding.kind)?;
        }
    }
    if !report.is_clean() {
        bail!("{} integrity finding(s)", report.findings.len());
    }
    Ok(())
}

fn mount_cmd(image_path: &str, mountpoint: &Path, args: &Args) -> Result<()> {
    let image = open_image(image_path, args)?;
    eprintln!(
        "Mounting WFS image {} at {} (read-only)",
        image_path,
        mountpoint.display()
    );

    let opts = MountOptions {
        read_only: true,
        allow_other: args.allow_other,
        auto_unmount: true,
    };
    let fs_ops: Box<dyn FsOps> = Box::new(image);
    wfs_fuse::mount(fs_ops, mountpoint, &opts)
        .with_context(|| format!("FUSE mount failed at {}", mountpoint.display()))?;
    Ok(())
}
