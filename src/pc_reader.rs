use crate::bitpack::{BitPack, UnpackDesc, UnpackState, ALL_BITS_READ};
use crate::cv_section::CompressedVectorSectionHeader;
use crate::packet::{PacketKind, PacketReader};
use crate::paged_reader::PagedReader;
use crate::schema::PointSet;
use crate::source::Source;
use crate::{Error, Result};
use tracing::trace;

/// Describes where the values of one component land in the output buffer.
///
/// Every decoded value of the byte stream `stream` is coerced to f32 and
/// written to `buffer[offset + item * stride]`, with `item` counting from
/// zero within each batch.
#[derive(Clone, Copy, Debug)]
pub struct WriteDesc {
    /// Buffer index of the component value of the first point of a batch.
    pub offset: usize,
    /// Buffer distance between the values of consecutive points.
    pub stride: usize,
    /// Byte stream to decode, which is also the index of the component
    /// in the point set prototype.
    pub stream: u32,
}

/// Decode progress of one byte stream.
///
/// Each stream advances through the shared packet sequence at its own
/// pace, the batch loop drives all of them until every stream produced
/// the same number of items.
struct ComponentReadState {
    /// Physical offset of the next packet to fetch for this stream.
    packet_offset: u64,
    /// Bit position inside the current stream slice, or [`ALL_BITS_READ`]
    /// to force fetching the next packet.
    bits_consumed: u32,
    /// Items produced so far in the current batch.
    items_written: usize,
    /// Packet-relative offset of the current stream slice.
    byte_stream_offset: u32,
    /// Number of bits in the current stream slice.
    bits_available: u32,
    /// Byte stream index of this state.
    stream: u32,
}

/// Streams all records of one point set into the caller's buffer,
/// invoking `consume` once per batch.
pub(crate) fn read_points<S, F>(
    paged: &mut PagedReader<S>,
    packets: &mut PacketReader,
    point_set: &PointSet,
    descs: &[WriteDesc],
    buffer: &mut [f32],
    point_capacity: usize,
    mut consume: F,
) -> Result<()>
where
    S: Source,
    F: FnMut(&[f32], usize),
{
    assert!(point_capacity > 0, "point capacity must not be zero");
    for desc in descs {
        assert!(
            (desc.stream as usize) < point_set.components.len(),
            "write descriptor references byte stream {} but the prototype has only {} components",
            desc.stream,
            point_set.components.len()
        );
        assert!(desc.stride > 0, "write descriptor stride must not be zero");
        let last = desc.offset + (point_capacity - 1) * desc.stride;
        assert!(
            last < buffer.len(),
            "write descriptor for byte stream {} overruns the output buffer",
            desc.stream
        );
    }

    let section = CompressedVectorSectionHeader::read(paged, point_set.file_offset)?;

    let mut states: Vec<ComponentReadState> = descs
        .iter()
        .map(|desc| ComponentReadState {
            packet_offset: section.data_offset,
            bits_consumed: ALL_BITS_READ,
            items_written: 0,
            byte_stream_offset: 0,
            bits_available: 0,
            stream: desc.stream,
        })
        .collect();

    let mut points_done = 0_u64;
    while points_done < point_set.record_count {
        let remaining = point_set.record_count - points_done;
        let batch = remaining.min(point_capacity as u64) as usize;
        for state in states.iter_mut() {
            state.items_written = 0;
        }

        loop {
            let mut done = true;
            for (state, desc) in states.iter_mut().zip(descs) {
                if state.items_written >= batch {
                    continue;
                }

                if state.bits_consumed == ALL_BITS_READ {
                    if state.packet_offset >= section.section_end {
                        return Err(Error::PrematureEndOfSection {
                            reason: format!(
                                "Byte stream {} ended after {} of {} points",
                                state.stream,
                                points_done + state.items_written as u64,
                                point_set.record_count
                            ),
                        });
                    }
                    state.packet_offset =
                        packets.fetch(paged, state.packet_offset, Some(PacketKind::Data))?;
                    let stream_count = packets.stream_count();
                    if state.stream >= stream_count {
                        return Err(Error::StreamMissing {
                            stream: state.stream,
                            stream_count: stream_count as u16,
                        });
                    }
                    let (stream_offset, bits) = packets.stream_extent(state.stream);
                    state.bits_consumed = 0;
                    state.byte_stream_offset = stream_offset;
                    state.bits_available = bits;
                }

                let data_type = &point_set.components[state.stream as usize].data_type;
                let unpack_desc = UnpackDesc {
                    byte_stream_offset: state.byte_stream_offset,
                    bits_available: state.bits_available,
                    max_items: batch,
                    offset: desc.offset,
                    stride: desc.stride,
                };
                let mut unpack_state = UnpackState {
                    items_written: state.items_written,
                    bits_consumed: state.bits_consumed,
                };
                BitPack::unpack(
                    data_type,
                    packets.bytes(),
                    &unpack_desc,
                    &mut unpack_state,
                    buffer,
                );
                debug_assert!(
                    unpack_state.items_written > state.items_written
                        || unpack_state.bits_consumed == ALL_BITS_READ,
                    "bit unpacker made no progress"
                );
                state.items_written = unpack_state.items_written;
                state.bits_consumed = unpack_state.bits_consumed;

                done = done && state.items_written >= batch;
            }
            if done {
                break;
            }
        }

        consume(buffer, batch);
        points_done += batch as u64;
        trace!(points_done, batch, "consumed batch");
    }

    Ok(())
}
