//! A pure Rust library for streaming point records out of ASTM E57 files.
//!
//! The decoder reads the paged CRC-protected binary layer of an E57 file,
//! parses the embedded XML descriptor into a flat [`Schema`] and streams
//! the bit-packed records of each compressed vector section in batches
//! into a caller-supplied f32 buffer.
//!
//! File bytes are accessed through the [`Source`] trait, so files can come
//! from memory, a memory mapping or anything else that can serve byte
//! ranges. Writing E57 files, image blobs and coordinate transforms are
//! out of scope.
//!
//! ```no_run
//! use e57_decode::{E57Decoder, MemorySource, WriteDesc};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("scan.e57")?;
//! let size = data.len() as u64;
//! let mut decoder = E57Decoder::open(MemorySource::new(data), size)?;
//!
//! // Interleave the first three byte streams as XYZ triplets.
//! let descs = [
//!     WriteDesc { offset: 0, stride: 3, stream: 0 },
//!     WriteDesc { offset: 1, stride: 3, stream: 1 },
//!     WriteDesc { offset: 2, stride: 3, stream: 2 },
//! ];
//! let mut buffer = vec![0.0_f32; 3 * 1024];
//! decoder.read_points(0, &descs, &mut buffer, 1024, |points, count| {
//!     for point in points.chunks(3).take(count) {
//!         println!("{} {} {}", point[0], point[1], point[2]);
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod bitpack;
mod bytes;
mod crc32;
mod cv_section;
mod decoder;
mod error;
mod header;
mod packet;
mod paged_reader;
mod pc_reader;
mod record;
mod schema;
mod source;

pub use self::decoder::{E57Decoder, PacketScan};
pub use self::error::{Error, Result};
pub use self::header::Header;
pub use self::pc_reader::WriteDesc;
pub use self::record::{Record, RecordDataType, RecordName};
pub use self::schema::{PointSet, Schema};
pub use self::source::{MemorySource, Source};
