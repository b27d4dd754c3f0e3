//! CRC-32C (ISCSI/Castagnoli) checksums for page validation.
//!
//! The table-driven SW implementation is based on the fallback of
//! <https://github.com/zowens/crc32c>. The optional `crc32c` feature
//! replaces it with that crate and its HW support.

#[cfg(not(feature = "crc32c"))]
const POLYNOMIAL: u32 = 0x82_F6_3B_78; // reflected 0x1EDC6F41

#[cfg(not(feature = "crc32c"))]
const TABLE: [u32; 256] = build_table();

#[cfg(not(feature = "crc32c"))]
const fn build_table() -> [u32; 256] {
    let mut table = [0_u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut val = i as u32;
        let mut k = 0;
        while k < 8 {
            if val & 1 != 0 {
                val = POLYNOMIAL ^ (val >> 1);
            } else {
                val >>= 1;
            }
            k += 1;
        }
        table[i] = val;
        i += 1;
    }
    table
}

/// Calculates the CRC-32C checksum of the given bytes.
#[cfg(not(feature = "crc32c"))]
pub fn checksum(data: &[u8]) -> u32 {
    !data.iter().fold(!0_u32, |sum, &next| {
        let index = (sum ^ next as u32) as u8;
        TABLE[index as usize] ^ (sum >> 8)
    })
}

/// Calculates the CRC-32C checksum of the given bytes.
#[cfg(feature = "crc32c")]
pub fn checksum(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty() {
        let data = [0_u8; 0];
        assert_eq!(checksum(&data), 0);
    }

    #[test]
    fn single_u64() {
        let data = [123_u8; 8];
        assert_eq!(checksum(&data), 3786498929);
    }

    #[test]
    fn full_page() {
        let mut data = [0_u8; 1024];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 256) as u8;
        }
        assert_eq!(checksum(&data), 752840335);
    }
}
