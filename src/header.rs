use crate::bytes::{u32_le, u64_le};
use crate::{Error, Result};
use tracing::debug;

const SIGNATURE: &[u8; 8] = b"ASTM-E57";
const MIN_PAGE_SIZE: u64 = 8;
const MAX_PAGE_SIZE: u64 = 1024 * 1024;

/// Represents the file structure from the start of an E57 file.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Header {
    /// Major version number of the E57 format of the file.
    pub major: u32,

    /// Minor version number of the E57 format of the file.
    pub minor: u32,

    /// Physical length of the E57 file on disk or in memory.
    pub phys_length: u64,

    /// Physical offset of the start of the XML data.
    pub phys_xml_offset: u64,

    /// Logical (without CRC bytes) length of the XML data.
    pub xml_length: u64,

    /// Page size of the E57 file.
    pub page_size: u64,
}

impl Header {
    /// Size of the header at the start of every E57 file.
    pub const SIZE: u64 = 48;

    /// Parses and validates an E57 file header structure.
    ///
    /// The header bytes sit before the first page checksum, so they are
    /// read raw from the start of the file, not through the page layer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE as usize {
            return Err(Error::IoFailure {
                reason: format!(
                    "Source produced {} of {} file header bytes",
                    data.len(),
                    Self::SIZE
                ),
            });
        }
        if &data[0..8] != SIGNATURE {
            return Err(Error::BadSignature);
        }

        let header = Header {
            major: u32_le(&data[8..12]),
            minor: u32_le(&data[12..16]),
            phys_length: u64_le(&data[16..24]),
            phys_xml_offset: u64_le(&data[24..32]),
            xml_length: u64_le(&data[32..40]),
            page_size: u64_le(&data[40..48]),
        };

        if header.page_size < MIN_PAGE_SIZE
            || header.page_size > MAX_PAGE_SIZE
            || !header.page_size.is_power_of_two()
        {
            return Err(Error::BadPageSize {
                page_size: header.page_size,
            });
        }

        debug!(
            major = header.major,
            minor = header.minor,
            phys_length = header.phys_length,
            phys_xml_offset = header.phys_xml_offset,
            xml_length = header.xml_length,
            page_size = header.page_size,
            "parsed file header"
        );

        Ok(header)
    }
}
