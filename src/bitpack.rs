use crate::bytes::{f32_le, f64_le, u64_le};
use crate::record::RecordDataType;

/// Sentinel marking a read position whose byte stream is exhausted.
///
/// A stream can run dry in the middle of an item, the remaining bits are
/// then padding and the next value starts at the beginning of the stream
/// slice in the next data packet.
pub const ALL_BITS_READ: u32 = u32::MAX;

/// Progress of one byte stream inside an unpack call.
#[derive(Clone, Copy, Debug)]
pub struct UnpackState {
    /// Items produced so far in the current batch.
    pub items_written: usize,
    /// Bit position inside the stream slice, or [`ALL_BITS_READ`].
    pub bits_consumed: u32,
}

/// Location of one byte stream inside the cached packet and the output
/// column its values are written to.
#[derive(Clone, Copy, Debug)]
pub struct UnpackDesc {
    /// Packet-relative offset of the first byte of the stream slice.
    pub byte_stream_offset: u32,
    /// Number of payload bits in the stream slice.
    pub bits_available: u32,
    /// Number of items requested for the current batch.
    pub max_items: usize,
    /// Output index of the first item.
    pub offset: usize,
    /// Output distance between consecutive items.
    pub stride: usize,
}

pub struct BitPack;

impl BitPack {
    /// Decodes consecutive values from one byte stream into a strided
    /// f32 output column.
    ///
    /// Returns with either all requested items written or with
    /// `bits_consumed == ALL_BITS_READ` after the stream ran out and the
    /// caller has to continue in the next packet. `packet` must extend at
    /// least eight bytes past the last stream byte so the integer paths
    /// can fetch a full word at the stream tail.
    pub fn unpack(
        data_type: &RecordDataType,
        packet: &[u8],
        desc: &UnpackDesc,
        state: &mut UnpackState,
        out: &mut [f32],
    ) {
        match *data_type {
            RecordDataType::Integer { min, bit_width, .. } => {
                unpack_integers(packet, desc, state, out, min, bit_width as u32, |v| v as f32);
            }
            RecordDataType::ScaledInteger {
                min,
                scale,
                offset,
                bit_width,
                ..
            } => {
                unpack_integers(packet, desc, state, out, min, bit_width as u32, move |v| {
                    (scale * v as f64 + offset) as f32
                });
            }
            RecordDataType::Single { .. } => {
                unpack_floats(packet, desc, state, out, 32, |bytes| f32_le(bytes));
            }
            RecordDataType::Double { .. } => {
                unpack_floats(packet, desc, state, out, 64, |bytes| f64_le(bytes) as f32);
            }
        }
    }
}

fn unpack_integers(
    packet: &[u8],
    desc: &UnpackDesc,
    state: &mut UnpackState,
    out: &mut [f32],
    min: i64,
    width: u32,
    convert: impl Fn(i64) -> f32,
) {
    let mask = if width == 0 {
        0
    } else {
        u64::MAX >> (u64::BITS - width)
    };

    let mut bits_consumed = state.bits_consumed;
    let mut bits_consumed_next = bits_consumed + width;
    let mut item = state.items_written;
    while item < desc.max_items {
        if desc.bits_available < bits_consumed_next {
            bits_consumed = ALL_BITS_READ;
            break;
        }

        let byte_offset = (bits_consumed >> 3) as usize;
        let shift = bits_consumed & 7;
        let base = desc.byte_stream_offset as usize + byte_offset;
        let bits = (u64_le(&packet[base..base + 8]) >> shift) & mask;

        bits_consumed = bits_consumed_next;
        bits_consumed_next += width;

        let value = min.wrapping_add(bits as i64);
        out[desc.offset + item * desc.stride] = convert(value);
        item += 1;
    }

    *state = UnpackState {
        items_written: item,
        bits_consumed,
    };
}

fn unpack_floats(
    packet: &[u8],
    desc: &UnpackDesc,
    state: &mut UnpackState,
    out: &mut [f32],
    width: u32,
    convert: impl Fn(&[u8]) -> f32,
) {
    let bytes = (width / 8) as usize;

    let mut bits_consumed = state.bits_consumed;
    let mut bits_consumed_next = bits_consumed + width;
    let mut item = state.items_written;
    while item < desc.max_items {
        if desc.bits_available < bits_consumed_next {
            bits_consumed = ALL_BITS_READ;
            break;
        }

        let byte_offset = (bits_consumed >> 3) as usize;
        let base = desc.byte_stream_offset as usize + byte_offset;
        out[desc.offset + item * desc.stride] = convert(&packet[base..base + bytes]);

        bits_consumed = bits_consumed_next;
        bits_consumed_next += width;
        item += 1;
    }

    *state = UnpackState {
        items_written: item,
        bits_consumed,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_state() -> UnpackState {
        UnpackState {
            items_written: 0,
            bits_consumed: 0,
        }
    }

    fn desc(bits_available: u32, max_items: usize) -> UnpackDesc {
        UnpackDesc {
            byte_stream_offset: 0,
            bits_available,
            max_items,
            offset: 0,
            stride: 1,
        }
    }

    /// Packs values of the given bit width into a stream with an
    /// eight byte fetch tail.
    fn pack(values: &[u64], width: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc = 0_u64;
        let mut filled = 0_u32;
        for &value in values {
            acc |= (value & (u64::MAX >> (64 - width.max(1)))) << filled;
            filled += width;
            while filled >= 8 {
                out.push(acc as u8);
                acc >>= 8;
                filled -= 8;
            }
        }
        if filled > 0 {
            out.push(acc as u8);
        }
        out.resize(out.len() + 8, 0);
        out
    }

    #[test]
    fn unpacks_byte_wide_integers() {
        let data_type = RecordDataType::Integer {
            min: 0,
            max: 255,
            bit_width: 8,
        };
        let stream = pack(&[0, 1, 2, 3], 8);
        let mut out = [0.0_f32; 4];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(32, 4), &mut state, &mut out);
        assert_eq!(state.items_written, 4);
        assert_eq!(state.bits_consumed, 32);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn unpacks_integers_straddling_bytes() {
        // Three 11 bit values span five bytes.
        let data_type = RecordDataType::Integer {
            min: -1000,
            max: 1000,
            bit_width: 11,
        };
        let stream = pack(&[0, 2000, 1000], 11);
        let mut out = [0.0_f32; 3];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(33, 3), &mut state, &mut out);
        assert_eq!(state.items_written, 3);
        assert_eq!(out, [-1000.0, 1000.0, 0.0]);
    }

    #[test]
    fn scales_and_offsets_integers() {
        let data_type = RecordDataType::ScaledInteger {
            min: -1000,
            max: 1000,
            scale: 0.001,
            offset: 0.0,
            bit_width: 11,
        };
        let stream = pack(&[2000], 11);
        let mut out = [0.0_f32; 1];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(11, 1), &mut state, &mut out);
        assert_eq!(state.items_written, 1);
        assert_eq!(out, [1.0]);
    }

    #[test]
    fn stops_at_exhausted_streams() {
        let data_type = RecordDataType::Integer {
            min: 0,
            max: 15,
            bit_width: 4,
        };
        // Five nibbles available, eight requested.
        let stream = pack(&[1, 2, 3, 4, 5], 4);
        let mut out = [0.0_f32; 8];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(20, 8), &mut state, &mut out);
        assert_eq!(state.items_written, 5);
        assert_eq!(state.bits_consumed, ALL_BITS_READ);
        assert_eq!(&out[..5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn discards_partial_trailing_items() {
        let data_type = RecordDataType::Integer {
            min: 0,
            max: 2047,
            bit_width: 11,
        };
        // 16 bits hold one full item and five padding bits.
        let stream = pack(&[7, 0], 11);
        let mut out = [0.0_f32; 2];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(16, 2), &mut state, &mut out);
        assert_eq!(state.items_written, 1);
        assert_eq!(state.bits_consumed, ALL_BITS_READ);
        assert_eq!(out[0], 7.0);
    }

    #[test]
    fn unpacks_singles_and_doubles() {
        let mut stream = Vec::new();
        for value in [1.5_f32, -2.25, 1e30] {
            stream.extend_from_slice(&value.to_le_bytes());
        }
        stream.resize(stream.len() + 8, 0);
        let data_type = RecordDataType::Single { min: 0.0, max: 0.0 };
        let mut out = [0.0_f32; 3];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(96, 3), &mut state, &mut out);
        assert_eq!(out, [1.5, -2.25, 1e30]);

        let mut stream = Vec::new();
        for value in [0.5_f64, -3.75] {
            stream.extend_from_slice(&value.to_le_bytes());
        }
        stream.resize(stream.len() + 8, 0);
        let data_type = RecordDataType::Double { min: 0.0, max: 0.0 };
        let mut out = [0.0_f32; 2];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(128, 2), &mut state, &mut out);
        assert_eq!(out, [0.5, -3.75]);
    }

    #[test]
    fn resumes_in_the_middle_of_a_batch() {
        let data_type = RecordDataType::Integer {
            min: 0,
            max: 255,
            bit_width: 8,
        };
        let stream = pack(&[10, 20, 30, 40], 8);
        let mut out = [0.0_f32; 4];

        // First two items from an imaginary earlier call.
        let mut state = UnpackState {
            items_written: 2,
            bits_consumed: 16,
        };
        BitPack::unpack(&data_type, &stream, &desc(32, 4), &mut state, &mut out);
        assert_eq!(state.items_written, 4);
        assert_eq!(&out[2..], &[30.0, 40.0]);
        assert_eq!(&out[..2], &[0.0, 0.0]);
    }

    #[test]
    fn writes_strided_output_columns() {
        let data_type = RecordDataType::Integer {
            min: 0,
            max: 255,
            bit_width: 8,
        };
        let stream = pack(&[1, 2, 3], 8);
        let mut out = [0.0_f32; 9];
        let mut state = fresh_state();
        let desc = UnpackDesc {
            byte_stream_offset: 0,
            bits_available: 24,
            max_items: 3,
            offset: 1,
            stride: 3,
        };
        BitPack::unpack(&data_type, &stream, &desc, &mut state, &mut out);
        assert_eq!(out, [0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn zero_width_integers_repeat_the_minimum() {
        let data_type = RecordDataType::Integer {
            min: 42,
            max: 42,
            bit_width: 0,
        };
        let stream = vec![0_u8; 8];
        let mut out = [0.0_f32; 3];
        let mut state = fresh_state();
        BitPack::unpack(&data_type, &stream, &desc(0, 3), &mut state, &mut out);
        assert_eq!(state.items_written, 3);
        assert_ne!(state.bits_consumed, ALL_BITS_READ);
        assert_eq!(out, [42.0, 42.0, 42.0]);
    }
}
