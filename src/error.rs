use std::fmt::Result as FmtResult;
use std::fmt::{Display, Formatter};
use std::result::Result as StdResult;

/// Possible errors that can occur while decoding E57 files.
///
/// Every error is fatal for the operation that produced it.
/// The decoder does not try to resynchronize on a later page.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The file ends before the requested structure.
    ShortFile {
        /// Description of the structure that did not fit.
        reason: String,
    },
    /// The first eight bytes of the file are not the ASCII signature `ASTM-E57`.
    BadSignature,
    /// The page size in the file header is not a supported power of two.
    BadPageSize {
        /// The rejected page size.
        page_size: u64,
    },
    /// A compressed vector section header did not start with section ID 1.
    BadSectionId {
        /// The section ID that was found instead.
        section_id: u8,
    },
    /// A page failed CRC-32C validation.
    CrcMismatch {
        /// Number of the corrupted page.
        page: u64,
        /// Checksum stored at the end of the page.
        expected: u32,
        /// Checksum calculated over the page payload.
        actual: u32,
    },
    /// A physical offset pointed into the CRC bytes at the end of a page.
    OutsidePayload {
        /// The offending physical offset.
        offset: u64,
    },
    /// The byte source could not produce the requested bytes.
    IoFailure {
        /// Description of the failed read.
        reason: String,
    },
    /// Found a packet of a different kind than the one required.
    UnexpectedPacketKind {
        /// Description of the mismatch.
        reason: String,
    },
    /// A data packet announced zero byte streams.
    EmptyData,
    /// A packet size is smaller than the packet header or not a multiple of four bytes.
    BadPacketAlignment {
        /// The rejected packet size.
        size: usize,
    },
    /// A byte stream extends past the end of its data packet.
    StreamOverflow {
        /// Index of the overflowing byte stream.
        stream: usize,
    },
    /// A read state refers to a byte stream the current data packet does not have.
    StreamMissing {
        /// The requested byte stream index.
        stream: u32,
        /// Number of byte streams in the packet.
        stream_count: u16,
    },
    /// A compressed vector section ended before all requested points were decoded.
    PrematureEndOfSection {
        /// Description of how far decoding got.
        reason: String,
    },
    /// A prototype component has an unrecognized tag or type.
    BadComponentType {
        /// Description of the offending component.
        reason: String,
    },
    /// Integer component bounds produce an unsupported bit width.
    BadBitRange {
        /// Description of the offending bounds.
        reason: String,
    },
    /// An XML attribute value is unrecognized or cannot be parsed.
    UnknownAttribute {
        /// Description of the offending attribute.
        reason: String,
    },
    /// The XML section is not a well-formed E57 descriptor.
    InvalidXml {
        /// Description of the defect.
        reason: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::ShortFile { reason } => write!(f, "File too short: {reason}"),
            Error::BadSignature => write!(f, "File does not start with the signature 'ASTM-E57'"),
            Error::BadPageSize { page_size } => {
                write!(f, "Page size {page_size} is not a supported power of two")
            }
            Error::BadSectionId { section_id } => write!(
                f,
                "Expected compressed vector section ID 1, found {section_id}"
            ),
            Error::CrcMismatch {
                page,
                expected,
                actual,
            } => write!(
                f,
                "Detected invalid checksum for page {page} (expected: {expected:#010x}, actual: {actual:#010x})"
            ),
            Error::OutsidePayload { offset } => write!(
                f,
                "Physical offset {offset} points outside the page payload"
            ),
            Error::IoFailure { reason } => write!(f, "Failed to read from byte source: {reason}"),
            Error::UnexpectedPacketKind { reason } => write!(f, "Unexpected packet: {reason}"),
            Error::EmptyData => write!(f, "A byte stream count of 0 is not allowed"),
            Error::BadPacketAlignment { size } => write!(
                f,
                "Packet size {size} is smaller than the packet header or not a multiple of four"
            ),
            Error::StreamOverflow { stream } => {
                write!(f, "Byte stream {stream} spans outside its packet")
            }
            Error::StreamMissing {
                stream,
                stream_count,
            } => write!(
                f,
                "Byte stream {stream} is missing, the data packet has only {stream_count} streams"
            ),
            Error::PrematureEndOfSection { reason } => {
                write!(f, "Premature end of section: {reason}")
            }
            Error::BadComponentType { reason } => write!(f, "Bad component: {reason}"),
            Error::BadBitRange { reason } => write!(f, "Bad integer bounds: {reason}"),
            Error::UnknownAttribute { reason } => write!(f, "Bad attribute: {reason}"),
            Error::InvalidXml { reason } => write!(f, "Invalid XML section: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = StdResult<T, Error>;

/// Converts foreign results and options into decoder results while
/// attaching a diagnostic message.
pub trait Converter<T, E> {
    /// Converts a failure into [`Error::IoFailure`].
    fn io_err<C: Into<String>>(self, msg: C) -> Result<T>;

    /// Converts a failure into [`Error::InvalidXml`].
    fn xml_err<C: Into<String>>(self, msg: C) -> Result<T>;

    /// Converts a failure into [`Error::UnknownAttribute`].
    fn attr_err<C: Into<String>>(self, msg: C) -> Result<T>;
}

impl<T, E: Display> Converter<T, E> for StdResult<T, E> {
    fn io_err<C: Into<String>>(self, msg: C) -> Result<T> {
        self.map_err(|e| Error::IoFailure {
            reason: format!("{}: {e}", msg.into()),
        })
    }

    fn xml_err<C: Into<String>>(self, msg: C) -> Result<T> {
        self.map_err(|e| Error::InvalidXml {
            reason: format!("{}: {e}", msg.into()),
        })
    }

    fn attr_err<C: Into<String>>(self, msg: C) -> Result<T> {
        self.map_err(|e| Error::UnknownAttribute {
            reason: format!("{}: {e}", msg.into()),
        })
    }
}

impl<T> Converter<T, ()> for Option<T> {
    fn io_err<C: Into<String>>(self, msg: C) -> Result<T> {
        self.ok_or_else(|| Error::IoFailure { reason: msg.into() })
    }

    fn xml_err<C: Into<String>>(self, msg: C) -> Result<T> {
        self.ok_or_else(|| Error::InvalidXml { reason: msg.into() })
    }

    fn attr_err<C: Into<String>>(self, msg: C) -> Result<T> {
        self.ok_or_else(|| Error::UnknownAttribute { reason: msg.into() })
    }
}
