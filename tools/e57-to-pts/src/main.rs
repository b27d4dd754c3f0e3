/*
 * Small example application that can export the first point set
 * in any E57 file as PTS ASCII point cloud.
 *
 * The output file name will be the input file + ".pts".
 * The first line holds the point count, every following line one
 * point as "X Y Z" followed by the intensity, if there is one.
 * The file is memory-mapped and fed to the decoder as a plain slice.
 */

use anyhow::{bail, Context, Result};
use e57_decode::{E57Decoder, MemorySource, RecordName, WriteDesc};
use memmap2::Mmap;
use std::env::args;
use std::fs::File;
use std::io::{BufWriter, Write};

const BATCH_SIZE: usize = 4096;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = args().collect();
    if args.len() < 2 {
        bail!("Usage: e57-to-pts <path/to/my.e57>");
    }

    let in_file = args[1].clone();
    let out_file = in_file.clone() + ".pts";

    let file = File::open(&in_file).context("Failed to open E57 file")?;
    let mmap = Mmap::map(&file).context("Failed to memory-map E57 file")?;
    let size = mmap.len() as u64;
    let mut decoder =
        E57Decoder::open(MemorySource::new(&mmap[..]), size).context("Failed to open E57 file")?;

    let point_set = decoder
        .point_sets()
        .first()
        .context("Unable to find a point set in the E57 file")?
        .clone();
    let stream_of = |name: RecordName| {
        point_set
            .components
            .iter()
            .position(|r| r.name == name)
            .map(|i| i as u32)
    };
    let x = stream_of(RecordName::CartesianX).context("Point set has no cartesianX component")?;
    let y = stream_of(RecordName::CartesianY).context("Point set has no cartesianY component")?;
    let z = stream_of(RecordName::CartesianZ).context("Point set has no cartesianZ component")?;
    let intensity = stream_of(RecordName::Intensity);

    let mut descs = vec![
        WriteDesc {
            offset: 0,
            stride: 4,
            stream: x,
        },
        WriteDesc {
            offset: 1,
            stride: 4,
            stream: y,
        },
        WriteDesc {
            offset: 2,
            stride: 4,
            stream: z,
        },
    ];
    if let Some(stream) = intensity {
        descs.push(WriteDesc {
            offset: 3,
            stride: 4,
            stream,
        });
    }

    let writer = File::create(&out_file).context("Unable to open output file for writing")?;
    let mut writer = BufWriter::new(writer);
    writer
        .write_fmt(format_args!("{}\n", point_set.record_count))
        .context("Failed to write point count")?;

    let mut buffer = vec![0.0_f32; 4 * BATCH_SIZE];
    let mut failed = None;
    decoder
        .read_points(0, &descs, &mut buffer, BATCH_SIZE, |points, count| {
            if failed.is_some() {
                return;
            }
            for point in points.chunks(4).take(count) {
                let result = if intensity.is_some() {
                    writer.write_fmt(format_args!(
                        "{} {} {} {}\n",
                        point[0], point[1], point[2], point[3]
                    ))
                } else {
                    writer.write_fmt(format_args!("{} {} {}\n", point[0], point[1], point[2]))
                };
                if let Err(err) = result {
                    failed = Some(err);
                    return;
                }
            }
        })
        .context("Failed to read point data")?;
    if let Some(err) = failed {
        return Err(err).context("Failed to write points");
    }

    Ok(())
}
