use crate::bytes::u16_le;
use crate::paged_reader::PagedReader;
use crate::source::Source;
use crate::{Error, Result};
use tracing::{debug, trace};

/// Largest possible packet, the 16 bit length field plus one.
pub const MAX_PACKET_SIZE: usize = 0x1_0000;

// Extra tail so the bit unpacker can always fetch eight bytes starting
// at any byte inside the packet.
const BUFFER_TAIL: usize = 8;

/// The packet kinds of a compressed vector section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    /// Seek aid with record number to offset entries, contents are
    /// descriptive only and stay uninterpreted.
    Index,
    /// Carries the byte streams with the bit-packed component values.
    Data,
    /// Filler without payload.
    Empty,
}

/// Reads and caches one packet of a compressed vector section at a time.
///
/// The decoded packet (bytes, size and byte stream index table) stays valid
/// until the next fetch of a different offset. Re-fetching the offset of the
/// cached packet touches neither the page layer nor the byte source, which
/// lets several read states share one decoded packet.
pub struct PacketReader {
    buffer: Vec<u8>,
    size: usize,
    kind: PacketKind,
    stream_offsets: Vec<u32>,
    current_offset: Option<u64>,
    next_offset: u64,
}

impl PacketReader {
    pub fn new() -> Self {
        Self {
            buffer: vec![0_u8; MAX_PACKET_SIZE + BUFFER_TAIL],
            size: 0,
            kind: PacketKind::Empty,
            stream_offsets: Vec::new(),
            current_offset: None,
            next_offset: 0,
        }
    }

    /// Reads the packet at a physical offset and returns the physical
    /// offset just past it.
    ///
    /// With `expected` set, a packet of any other kind fails with
    /// [`Error::UnexpectedPacketKind`] before its payload is read.
    pub fn fetch<S: Source>(
        &mut self,
        reader: &mut PagedReader<S>,
        offset: u64,
        expected: Option<PacketKind>,
    ) -> Result<u64> {
        if self.current_offset == Some(offset) {
            self.check_kind(expected)?;
            return Ok(self.next_offset);
        }
        self.current_offset = None;

        let mut pos = offset;
        reader.read_at(&mut pos, &mut self.buffer[..4])?;
        self.kind = match self.buffer[0] {
            0 => PacketKind::Index,
            1 => PacketKind::Data,
            2 => PacketKind::Empty,
            id => {
                return Err(Error::UnexpectedPacketKind {
                    reason: format!("Unknown packet ID {id} at offset {offset}"),
                })
            }
        };
        self.size = u16_le(&self.buffer[2..4]) as usize + 1;
        if self.size < 4 {
            return Err(Error::BadPacketAlignment { size: self.size });
        }
        self.check_kind(expected)?;

        let size = self.size;
        reader.read_at(&mut pos, &mut self.buffer[4..size])?;

        match self.kind {
            PacketKind::Data => self.index_streams(offset)?,
            PacketKind::Index => {
                self.stream_offsets.clear();
                let flags = self.buffer[1];
                if self.size >= 8 {
                    let entry_count = u16_le(&self.buffer[4..6]);
                    let index_level = self.buffer[6];
                    debug!(
                        offset,
                        size = self.size,
                        flags,
                        entry_count,
                        index_level,
                        "skipping index packet"
                    );
                } else {
                    debug!(offset, size = self.size, flags, "skipping index packet");
                }
            }
            PacketKind::Empty => {
                self.stream_offsets.clear();
                trace!(offset, size = self.size, "skipping empty packet");
            }
        }

        self.current_offset = Some(offset);
        self.next_offset = pos;
        Ok(pos)
    }

    fn check_kind(&self, expected: Option<PacketKind>) -> Result<()> {
        match expected {
            Some(kind) if kind != self.kind => Err(Error::UnexpectedPacketKind {
                reason: format!("Required a {:?} packet, found a {:?} packet", kind, self.kind),
            }),
            _ => Ok(()),
        }
    }

    /// Builds the cumulative byte stream offset table of a data packet.
    fn index_streams(&mut self, offset: u64) -> Result<()> {
        if self.size % 4 != 0 {
            return Err(Error::BadPacketAlignment { size: self.size });
        }
        let stream_count = u16_le(&self.buffer[4..6]);
        if stream_count == 0 {
            return Err(Error::EmptyData);
        }

        self.stream_offsets.clear();
        let mut end = 6 + 2 * stream_count as u32;
        if end as usize > self.size {
            return Err(Error::StreamOverflow { stream: 0 });
        }
        self.stream_offsets.push(end);
        for stream in 0..stream_count as usize {
            let length = u16_le(&self.buffer[6 + 2 * stream..8 + 2 * stream]) as u32;
            end += length;
            if end as usize > self.size {
                return Err(Error::StreamOverflow { stream });
            }
            self.stream_offsets.push(end);
        }

        trace!(offset, size = self.size, stream_count, "decoded data packet");
        Ok(())
    }

    /// Kind of the cached packet.
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Number of byte streams in the cached data packet.
    pub fn stream_count(&self) -> u32 {
        self.stream_offsets.len().saturating_sub(1) as u32
    }

    /// Packet-relative start offset and bit count of one byte stream.
    pub fn stream_extent(&self, stream: u32) -> (u32, u32) {
        let start = self.stream_offsets[stream as usize];
        let end = self.stream_offsets[stream as usize + 1];
        (start, 8 * (end - start))
    }

    /// The cached packet bytes, including the over-read tail.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc32;
    use crate::source::MemorySource;

    const PAGE_SIZE: u64 = 1024;

    fn packet_file(packets: &[&[u8]]) -> Vec<u8> {
        let mut payload = Vec::new();
        for p in packets {
            payload.extend_from_slice(p);
        }
        payload.resize((PAGE_SIZE - 4) as usize, 0);
        let crc = crc32::checksum(&payload);
        payload.extend_from_slice(&crc.to_be_bytes());
        payload
    }

    fn data_packet(streams: &[&[u8]]) -> Vec<u8> {
        let mut p = vec![1_u8, 0, 0, 0];
        p.extend_from_slice(&(streams.len() as u16).to_le_bytes());
        for s in streams {
            p.extend_from_slice(&(s.len() as u16).to_le_bytes());
        }
        for s in streams {
            p.extend_from_slice(s);
        }
        while p.len() % 4 != 0 {
            p.push(0);
        }
        let length = (p.len() - 1) as u16;
        p[2..4].copy_from_slice(&length.to_le_bytes());
        p
    }

    fn reader_for(file: Vec<u8>) -> PagedReader<MemorySource<Vec<u8>>> {
        let size = file.len() as u64;
        PagedReader::new(MemorySource::new(file), size, PAGE_SIZE)
    }

    #[test]
    fn indexes_byte_streams_of_data_packets() {
        let packet = data_packet(&[&[1, 2, 3], &[4, 5]]);
        let packet_size = packet.len() as u64;
        let mut reader = reader_for(packet_file(&[&packet]));
        let mut packets = PacketReader::new();

        let next = packets.fetch(&mut reader, 0, Some(PacketKind::Data)).unwrap();
        assert_eq!(next, packet_size);
        assert_eq!(packets.kind(), PacketKind::Data);
        assert_eq!(packets.stream_count(), 2);
        assert_eq!(packets.stream_extent(0), (10, 24));
        assert_eq!(packets.stream_extent(1), (13, 16));
        assert_eq!(&packets.bytes()[10..13], &[1, 2, 3]);
        assert_eq!(&packets.bytes()[13..15], &[4, 5]);
    }

    #[test]
    fn caches_the_last_packet() {
        let packet = data_packet(&[&[1, 2, 3, 4]]);
        let mut reader = reader_for(packet_file(&[&packet]));
        let mut packets = PacketReader::new();

        let first = packets.fetch(&mut reader, 0, Some(PacketKind::Data)).unwrap();
        // A cache hit must return the same next offset again.
        let second = packets.fetch(&mut reader, 0, Some(PacketKind::Data)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_unexpected_kinds() {
        let empty = [2_u8, 0, 3, 0];
        let mut reader = reader_for(packet_file(&[&empty]));
        let mut packets = PacketReader::new();

        let result = packets.fetch(&mut reader, 0, Some(PacketKind::Data));
        assert!(matches!(result, Err(Error::UnexpectedPacketKind { .. })));

        let mut reader = reader_for(packet_file(&[&empty]));
        let next = packets.fetch(&mut reader, 0, None).unwrap();
        assert_eq!(next, 4);
        assert_eq!(packets.kind(), PacketKind::Empty);
    }

    #[test]
    fn rejects_unknown_packet_ids() {
        let bogus = [9_u8, 0, 3, 0];
        let mut reader = reader_for(packet_file(&[&bogus]));
        let mut packets = PacketReader::new();

        let result = packets.fetch(&mut reader, 0, None);
        assert!(matches!(result, Err(Error::UnexpectedPacketKind { .. })));
    }

    #[test]
    fn rejects_misaligned_data_packets() {
        // Size 6 is not a multiple of four.
        let packet = [1_u8, 0, 5, 0, 1, 0];
        let mut reader = reader_for(packet_file(&[&packet]));
        let mut packets = PacketReader::new();

        let result = packets.fetch(&mut reader, 0, None);
        assert!(matches!(
            result,
            Err(Error::BadPacketAlignment { size: 6 })
        ));
    }

    #[test]
    fn rejects_data_packets_without_streams() {
        let packet = [1_u8, 0, 7, 0, 0, 0, 0, 0];
        let mut reader = reader_for(packet_file(&[&packet]));
        let mut packets = PacketReader::new();

        let result = packets.fetch(&mut reader, 0, None);
        assert!(matches!(result, Err(Error::EmptyData)));
    }

    #[test]
    fn rejects_overflowing_streams() {
        // One stream of 100 bytes announced in a 12 byte packet.
        let mut packet = vec![1_u8, 0, 11, 0, 1, 0];
        packet.extend_from_slice(&100_u16.to_le_bytes());
        packet.resize(12, 0);
        let mut reader = reader_for(packet_file(&[&packet]));
        let mut packets = PacketReader::new();

        let result = packets.fetch(&mut reader, 0, None);
        assert!(matches!(result, Err(Error::StreamOverflow { stream: 0 })));
    }

    #[test]
    fn tolerates_index_packets() {
        let mut index = vec![0_u8; 20];
        index[0] = 0;
        index[2..4].copy_from_slice(&19_u16.to_le_bytes());
        index[4..6].copy_from_slice(&1_u16.to_le_bytes());
        let mut reader = reader_for(packet_file(&[&index]));
        let mut packets = PacketReader::new();

        let next = packets.fetch(&mut reader, 0, None).unwrap();
        assert_eq!(next, 20);
        assert_eq!(packets.kind(), PacketKind::Index);
        assert_eq!(packets.stream_count(), 0);
    }
}
