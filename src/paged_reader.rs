use crate::crc32;
use crate::source::Source;
use crate::{Error, Result};
use tracing::trace;

const CHECKSUM_SIZE: u64 = 4;

/// Reads logically contiguous payload bytes from the physical page frames
/// of an E57 file, validating the CRC of every page it touches.
///
/// Every `page_size` bytes of the file form one frame: `page_size - 4`
/// payload bytes followed by the CRC-32C of that payload. Physical offsets
/// address raw file bytes, logical offsets skip the checksums. The last
/// verified page stays buffered, so repeated reads inside one page do not
/// go back to the source.
pub struct PagedReader<S: Source> {
    source: S,
    phys_size: u64,
    page_size: u64,
    logical_page_size: u64,
    mask: u64,
    shift: u32,
    page_buffer: Vec<u8>,
    page_num: Option<u64>,
}

impl<S: Source> PagedReader<S> {
    /// Creates a paged reader over `phys_size` bytes of `source`.
    ///
    /// The page size must be a power of two bigger than the checksum,
    /// which the header decoder has already validated.
    pub fn new(source: S, phys_size: u64, page_size: u64) -> Self {
        debug_assert!(page_size.is_power_of_two() && page_size > CHECKSUM_SIZE);
        Self {
            source,
            phys_size,
            page_size,
            logical_page_size: page_size - CHECKSUM_SIZE,
            mask: page_size - 1,
            shift: page_size.trailing_zeros(),
            page_buffer: vec![0_u8; page_size as usize],
            page_num: None,
        }
    }

    /// Converts a physical offset inside a page payload to the logical
    /// offset of the same byte.
    pub fn physical_to_logical(&self, physical: u64) -> u64 {
        (physical >> self.shift) * self.logical_page_size + (physical & self.mask)
    }

    /// Converts a logical offset back to its physical offset.
    pub fn logical_to_physical(&self, logical: u64) -> u64 {
        (logical / self.logical_page_size) * self.page_size + (logical % self.logical_page_size)
    }

    /// Reads `dst.len()` payload bytes starting at `*physical`.
    ///
    /// On success `*physical` points just past the last byte read. When
    /// that lands exactly on a page checksum the offset is moved past it,
    /// so the next read resumes inside payload.
    pub fn read_at(&mut self, physical: &mut u64, dst: &mut [u8]) -> Result<()> {
        let mut in_page = *physical & self.mask;
        if in_page >= self.logical_page_size {
            return Err(Error::OutsidePayload { offset: *physical });
        }

        let mut page = *physical >> self.shift;
        let mut done = 0_usize;
        while done < dst.len() {
            self.load_page(page)?;
            let available = (self.logical_page_size - in_page) as usize;
            let take = available.min(dst.len() - done);
            let start = in_page as usize;
            dst[done..done + take].copy_from_slice(&self.page_buffer[start..start + take]);
            *physical = page * self.page_size + in_page + take as u64;
            done += take;
            in_page = 0;
            page += 1;
        }

        if *physical & self.mask == self.logical_page_size {
            *physical += CHECKSUM_SIZE;
        }
        Ok(())
    }

    fn load_page(&mut self, page: u64) -> Result<()> {
        if self.page_num == Some(page) {
            return Ok(());
        }

        let offset = page * self.page_size;
        if offset + self.page_size > self.phys_size {
            return Err(Error::ShortFile {
                reason: format!("Page {page} extends past the end of the file"),
            });
        }
        let bytes = self.source.view(offset, self.page_size);
        if bytes.len() as u64 != self.page_size {
            self.page_num = None;
            return Err(Error::IoFailure {
                reason: format!(
                    "Source produced {} of {} bytes for page {page}",
                    bytes.len(),
                    self.page_size
                ),
            });
        }
        self.page_buffer.copy_from_slice(bytes);

        let payload = &self.page_buffer[..self.logical_page_size as usize];
        let actual = crc32::checksum(payload);
        // The standard stores all binary values little endian, but the page
        // checksum on disk only compares equal when read back big endian.
        let tail = &self.page_buffer[self.logical_page_size as usize..];
        let expected = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        if expected != actual {
            self.page_num = None;
            return Err(Error::CrcMismatch {
                page,
                expected,
                actual,
            });
        }

        trace!(page, "verified page");
        self.page_num = Some(page);
        Ok(())
    }
}
