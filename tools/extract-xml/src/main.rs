/*
 * Small example application that will extract the XML section
 * of any E57 file and write it to stdout.
 */

use anyhow::{bail, Context, Result};
use e57_decode::{E57Decoder, MemorySource};
use std::env::args;

fn main() -> Result<()> {
    let args: Vec<String> = args().collect();
    if args.len() < 2 {
        bail!("Usage: extract-xml <path/to/my.e57>");
    }

    let data = std::fs::read(&args[1]).context("Failed to read E57 file")?;
    let size = data.len() as u64;
    let decoder =
        E57Decoder::open(MemorySource::new(data), size).context("Failed to open E57 file")?;
    println!("{}", decoder.xml());

    Ok(())
}
