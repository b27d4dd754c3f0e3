use crate::{Error, Result};

// A value of more than 56 bits can straddle nine bytes once the bit
// cursor sits inside a byte, which no longer fits the single eight
// byte fetch of the unpacker.
const MAX_BIT_WIDTH: u32 = 56;

/// Semantic role of one component of a point record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordName {
    /// X coordinate of a point in Cartesian coordinates.
    CartesianX,
    /// Y coordinate of a point in Cartesian coordinates.
    CartesianY,
    /// Z coordinate of a point in Cartesian coordinates.
    CartesianZ,
    /// Distance from the origin in spherical coordinates.
    SphericalRange,
    /// Azimuth angle in spherical coordinates.
    SphericalAzimuth,
    /// Elevation angle in spherical coordinates.
    SphericalElevation,
    /// Row number of a point in a gridded point set.
    RowIndex,
    /// Column number of a point in a gridded point set.
    ColumnIndex,
    /// Number of returns of the pulse that produced this point.
    ReturnCount,
    /// Which return of its pulse this point is.
    ReturnIndex,
    /// Time the point was captured.
    TimeStamp,
    /// Strength of the returned signal.
    Intensity,
    /// Red color value.
    ColorRed,
    /// Green color value.
    ColorGreen,
    /// Blue color value.
    ColorBlue,
    /// Non-zero if the Cartesian coordinates are not meaningful.
    CartesianInvalidState,
    /// Non-zero if the spherical coordinates are not meaningful.
    SphericalInvalidState,
    /// Non-zero if the time stamp is not meaningful.
    IsTimeStampInvalid,
    /// Non-zero if the intensity is not meaningful.
    IsIntensityInvalid,
    /// Non-zero if the color values are not meaningful.
    IsColorInvalid,
}

impl RecordName {
    /// Maps a prototype tag name to its record name.
    pub(crate) fn from_tag_name(tag: &str) -> Result<Self> {
        Ok(match tag {
            "cartesianX" => RecordName::CartesianX,
            "cartesianY" => RecordName::CartesianY,
            "cartesianZ" => RecordName::CartesianZ,
            "sphericalRange" => RecordName::SphericalRange,
            "sphericalAzimuth" => RecordName::SphericalAzimuth,
            "sphericalElevation" => RecordName::SphericalElevation,
            "rowIndex" => RecordName::RowIndex,
            "columnIndex" => RecordName::ColumnIndex,
            "returnCount" => RecordName::ReturnCount,
            "returnIndex" => RecordName::ReturnIndex,
            "timeStamp" => RecordName::TimeStamp,
            "intensity" => RecordName::Intensity,
            "colorRed" => RecordName::ColorRed,
            "colorGreen" => RecordName::ColorGreen,
            "colorBlue" => RecordName::ColorBlue,
            "cartesianInvalidState" => RecordName::CartesianInvalidState,
            "sphericalInvalidState" => RecordName::SphericalInvalidState,
            "isTimeStampInvalid" => RecordName::IsTimeStampInvalid,
            "isIntensityInvalid" => RecordName::IsIntensityInvalid,
            "isColorInvalid" => RecordName::IsColorInvalid,
            _ => {
                return Err(Error::BadComponentType {
                    reason: format!("Unknown prototype tag '{tag}'"),
                })
            }
        })
    }
}

/// Storage type of one component of a point record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecordDataType {
    /// 32 bit IEEE 754 floating point value.
    Single { min: f64, max: f64 },
    /// 64 bit IEEE 754 floating point value.
    Double { min: f64, max: f64 },
    /// Bit-packed signed integer between min and max.
    Integer { min: i64, max: i64, bit_width: u8 },
    /// Bit-packed signed integer n representing the value `scale * n + offset`.
    ScaledInteger {
        min: i64,
        max: i64,
        scale: f64,
        offset: f64,
        bit_width: u8,
    },
}

impl RecordDataType {
    /// Number of bits one value of this type occupies in a byte stream.
    pub fn bit_width(&self) -> u32 {
        match self {
            RecordDataType::Single { .. } => 32,
            RecordDataType::Double { .. } => 64,
            RecordDataType::Integer { bit_width, .. }
            | RecordDataType::ScaledInteger { bit_width, .. } => *bit_width as u32,
        }
    }
}

/// Smallest number of bits that can hold all values between min and max.
pub(crate) fn integer_bit_width(min: i64, max: i64) -> Result<u8> {
    if max < min {
        return Err(Error::BadBitRange {
            reason: format!("Minimum {min} is bigger than maximum {max}"),
        });
    }
    let range = max.wrapping_sub(min) as u64;
    let bits = u64::BITS - range.leading_zeros();
    if bits > MAX_BIT_WIDTH {
        return Err(Error::BadBitRange {
            reason: format!("Integers with {bits} bits are not supported"),
        });
    }
    Ok(bits as u8)
}

/// One component of a point record.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Role of the component inside a point record.
    pub name: RecordName,
    /// Storage type of the component values.
    pub data_type: RecordDataType,
}
