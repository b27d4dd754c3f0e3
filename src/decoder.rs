use crate::cv_section::CompressedVectorSectionHeader;
use crate::error::Converter;
use crate::header::Header;
use crate::packet::{PacketKind, PacketReader};
use crate::paged_reader::PagedReader;
use crate::pc_reader::{read_points, WriteDesc};
use crate::schema::{PointSet, Schema};
use crate::source::Source;
use crate::{Error, Result};
use tracing::debug;

const MAX_XML_SIZE: u64 = 10 * 1024 * 1024;

/// Main interface for streaming point records out of E57 files.
///
/// Opening a decoder reads the file header and the XML schema. The page
/// and packet buffers are sized once at open time and reused afterwards.
pub struct E57Decoder<S: Source> {
    paged: PagedReader<S>,
    packets: PacketReader,
    header: Header,
    xml: String,
    schema: Schema,
}

impl<S: Source> E57Decoder<S> {
    /// Opens an E57 file of `file_size` bytes behind the given source.
    ///
    /// Validates the file header, extracts the XML section through the
    /// CRC page layer and parses the schema from it.
    pub fn open(mut source: S, file_size: u64) -> Result<Self> {
        if file_size < Header::SIZE {
            return Err(Error::ShortFile {
                reason: format!("{file_size} bytes cannot contain an E57 file header"),
            });
        }
        // The header precedes the first page checksum and is read raw.
        let header = Header::from_bytes(source.view(0, Header::SIZE))?;

        let mut paged = PagedReader::new(source, file_size, header.page_size);

        if header.xml_length > MAX_XML_SIZE {
            return Err(Error::InvalidXml {
                reason: format!("XML sections larger than {MAX_XML_SIZE} bytes are not supported"),
            });
        }
        let mut xml_raw = vec![0_u8; header.xml_length as usize];
        let mut offset = header.phys_xml_offset;
        paged.read_at(&mut offset, &mut xml_raw)?;
        let xml = String::from_utf8(xml_raw).xml_err("XML section is not valid UTF-8")?;
        let schema = Schema::from_xml(&xml)?;

        Ok(Self {
            paged,
            packets: PacketReader::new(),
            header,
            xml,
            schema,
        })
    }

    /// Returns the contents of the E57 binary file header structure.
    pub fn header(&self) -> Header {
        self.header.clone()
    }

    /// Returns the XML section of the E57 file.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Returns the schema parsed from the XML section.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the point set descriptors of the file.
    pub fn point_sets(&self) -> &[PointSet] {
        &self.schema.point_sets
    }

    /// Streams all records of one point set into `buffer`.
    ///
    /// The buffer holds up to `point_capacity` points laid out according
    /// to `descs`, all values coerced to f32. `consume` is invoked with
    /// the buffer and the number of decoded points once per batch, which
    /// happens `ceil(record_count / point_capacity)` times in increasing
    /// point order. Batches are full except possibly the last one.
    ///
    /// # Panics
    ///
    /// Panics if `point_set_index` is out of range, `point_capacity` is
    /// zero, a descriptor references a byte stream the prototype does not
    /// have, or a descriptor range does not fit the buffer.
    pub fn read_points<F>(
        &mut self,
        point_set_index: usize,
        descs: &[WriteDesc],
        buffer: &mut [f32],
        point_capacity: usize,
        consume: F,
    ) -> Result<()>
    where
        F: FnMut(&[f32], usize),
    {
        let point_set = &self.schema.point_sets[point_set_index];
        debug!(
            point_set_index,
            record_count = point_set.record_count,
            components = descs.len(),
            "reading points"
        );
        read_points(
            &mut self.paged,
            &mut self.packets,
            point_set,
            descs,
            buffer,
            point_capacity,
            consume,
        )
    }

    /// Reads payload bytes at a physical offset, verifying the CRC of
    /// every page it touches and skipping the checksums.
    ///
    /// On return `physical_offset` points at the first payload byte
    /// after the read data.
    pub fn read_bytes(&mut self, dst: &mut [u8], physical_offset: &mut u64) -> Result<()> {
        self.paged.read_at(physical_offset, dst)
    }

    /// Walks all packets of a point set's section without decoding values.
    ///
    /// Index and empty packets are tolerated and counted, the contents of
    /// index packets stay uninterpreted.
    ///
    /// # Panics
    ///
    /// Panics if `point_set_index` is out of range.
    pub fn scan_packets(&mut self, point_set_index: usize) -> Result<PacketScan> {
        let point_set = &self.schema.point_sets[point_set_index];
        let section = CompressedVectorSectionHeader::read(&mut self.paged, point_set.file_offset)?;

        let mut scan = PacketScan::default();
        let mut offset = section.data_offset;
        while offset < section.section_end {
            offset = self.packets.fetch(&mut self.paged, offset, None)?;
            match self.packets.kind() {
                PacketKind::Index => scan.index_packets += 1,
                PacketKind::Data => scan.data_packets += 1,
                PacketKind::Empty => scan.empty_packets += 1,
            }
        }
        debug!(?scan, "scanned section");
        Ok(scan)
    }
}

/// Packet census of one compressed vector section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketScan {
    /// Number of data packets in the section.
    pub data_packets: u64,
    /// Number of index packets in the section.
    pub index_packets: u64,
    /// Number of empty packets in the section.
    pub empty_packets: u64,
}
