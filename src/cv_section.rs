use crate::bytes::u64_le;
use crate::paged_reader::PagedReader;
use crate::source::Source;
use crate::{Error, Result};
use tracing::debug;

/// Header of a compressed vector binary section.
///
/// Sits at the physical file offset announced by the schema and describes
/// where the packets of the section start and how long the section is.
#[derive(Clone, Debug)]
pub struct CompressedVectorSectionHeader {
    /// Logical (without CRC bytes) length of the whole section,
    /// including this header.
    pub section_length: u64,

    /// Physical offset of the first data packet.
    pub data_offset: u64,

    /// Physical offset of the first index packet, zero if there is none.
    pub index_offset: u64,

    /// Physical offset just past the end of the section.
    pub section_end: u64,
}

impl CompressedVectorSectionHeader {
    pub const SIZE: u64 = 32;

    /// Reads the 32 byte section header at the given physical offset.
    pub fn read<S: Source>(
        reader: &mut PagedReader<S>,
        section_offset: u64,
    ) -> Result<CompressedVectorSectionHeader> {
        let mut buffer = [0_u8; Self::SIZE as usize];
        let mut offset = section_offset;
        reader.read_at(&mut offset, &mut buffer)?;

        let section_id = buffer[0];
        if section_id != 1 {
            return Err(Error::BadSectionId { section_id });
        }
        let section_length = u64_le(&buffer[8..16]);
        let data_offset = u64_le(&buffer[16..24]);
        let index_offset = u64_le(&buffer[24..32]);

        // The section length counts logical bytes while packet offsets are
        // physical, so the end is computed through the logical address space.
        let logical_end = reader.physical_to_logical(section_offset) + section_length;
        let section_end = reader.logical_to_physical(logical_end);

        let header = Self {
            section_length,
            data_offset,
            index_offset,
            section_end,
        };
        debug!(
            section_length,
            data_offset, index_offset, section_end, "read compressed vector section header"
        );
        Ok(header)
    }
}
