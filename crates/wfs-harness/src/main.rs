#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::env;
use std::path::Path;
use wfs_harness::{fixtures, load_manifest};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str);

    match cmd {
        Some("generate-sample") => {
            let out = args.get(1).context("usage: wfs-harness generate-sample <out>")?;
            let builder = fixtures::sample_tree()?;
            builder.write_to(Path::new(out))?;
            println!("wrote sample image to {out}");
            Ok(())
        }
        Some("build") => {
            let (Some(manifest), Some(out)) = (args.get(1), args.get(2)) else {
                bail!("usage: wfs-harness build <manifest.json> <out>");
            };
            let manifest = load_manifest(Path::new(manifest))?;
            let builder = manifest.build().context("failed to lay out image")?;
            builder.write_to(Path::new(out))?;
            println!("wrote {} entries to {out}", manifest.entries.len());
            Ok(())
        }
        Some("--help" | "-h" | "help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn print_usage() {
    println!("wfs-harness: synthetic WFS image generator");
    println!();
    println!("USAGE:");
    println!("  wfs-harness generate-sample <out>");
    println!("  wfs-harness build <manifest.json> <out>");
}
