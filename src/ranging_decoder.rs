//! Decoder for the ranging notifications the robot pushes while its radar
//! sweeps.
//!
//! A payload looks like `XX<position>&<distance>&<anything>`: two throwaway
//! characters, the column the sensor is pointing at, then the measured
//! distance. Everything after the second `&` is ignored. There is no length
//! prefix and no checksum, so anything that is not exactly this shape is
//! rejected rather than guessed at.

use nom::{
    bytes::complete::{take, take_until},
    character::complete::{char, i32},
    combinator::all_consuming,
    sequence::terminated,
    Finish, IResult,
};

use std::{borrow::Cow, fmt, str::FromStr};

/// Number of characters in front of the position field.
pub const PREFIX_LEN: usize = 2;

const DELIMITER: char = '&';

/// One radar reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangingSample {
    /// Column index the sensor was facing
    pub position: i32,
    /// Measured distance, in sensor units
    pub distance: i32,
}

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload was not valid UTF-8.
    NotUtf8,
    /// No `&` between position and distance.
    MissingDelimiter,
    /// Fewer than [`PREFIX_LEN`] characters in front of the first `&`.
    PrefixTooShort,
    /// The position field is not an integer.
    InvalidPosition(String),
    /// The distance field is not an integer.
    InvalidDistance(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DecodeError as DE;
        let msg = match self {
            DE::NotUtf8 => Cow::from("payload is not utf-8"),
            DE::MissingDelimiter => Cow::from("no '&' delimiter in payload"),
            DE::PrefixTooShort => Cow::from("position field is shorter than its prefix"),
            DE::InvalidPosition(field) => Cow::from(format!("bad position field {:?}", field)),
            DE::InvalidDistance(field) => Cow::from(format!("bad distance field {:?}", field)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for DecodeError {}

/// Splits at the first delimiter, consuming it. The right side is returned
/// as the remaining input.
fn split_field(s: &str) -> IResult<&str, &str> {
    terminated(take_until("&"), char(DELIMITER))(s)
}

fn parse_integer(field: &str) -> Option<i32> {
    all_consuming(i32::<&str, nom::error::Error<&str>>)(field)
        .finish()
        .ok()
        .map(|(_, n)| n)
}

fn parse_position(field: &str) -> Result<i32, DecodeError> {
    let (digits, _prefix) = take::<_, _, nom::error::Error<&str>>(PREFIX_LEN)(field)
        .finish()
        .map_err(|_| DecodeError::PrefixTooShort)?;
    parse_integer(digits).ok_or_else(|| DecodeError::InvalidPosition(digits.to_owned()))
}

fn parse_distance(s: &str) -> Result<i32, DecodeError> {
    // The trailer is optional, so a missing second delimiter just means the
    // whole remainder is the distance.
    let field = match split_field(s).finish() {
        Ok((_trailer, field)) => field,
        Err(_) => s,
    };
    parse_integer(field).ok_or_else(|| DecodeError::InvalidDistance(field.to_owned()))
}

/// Decodes a payload that is already text.
pub fn decode(s: &str) -> Result<RangingSample, DecodeError> {
    let (remaining, position_field) = split_field(s)
        .finish()
        .map_err(|_| DecodeError::MissingDelimiter)?;

    Ok(RangingSample {
        position: parse_position(position_field)?,
        distance: parse_distance(remaining)?,
    })
}

/// Decodes a raw notification value.
pub fn decode_bytes(payload: &[u8]) -> Result<RangingSample, DecodeError> {
    let s = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
    decode(s)
}

impl FromStr for RangingSample {
    type Err = DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_documented_shape() {
        assert_eq!(
            decode("XX12&345&rest"),
            Ok(RangingSample {
                position: 12,
                distance: 345
            })
        );
    }

    #[test]
    fn prefix_is_skipped_whatever_it_is() {
        let sample: RangingSample = "b'7&1000&".parse().unwrap();
        assert_eq!(sample.position, 7);
        assert_eq!(sample.distance, 1000);
    }

    #[test]
    fn trailer_is_optional() {
        assert_eq!(
            decode("XX0&42"),
            Ok(RangingSample {
                position: 0,
                distance: 42
            })
        );
    }

    #[test]
    fn missing_delimiter() {
        assert_eq!(decode("XX12"), Err(DecodeError::MissingDelimiter));
        assert_eq!(decode(""), Err(DecodeError::MissingDelimiter));
    }

    #[test]
    fn short_prefix() {
        assert_eq!(decode("X&12&"), Err(DecodeError::PrefixTooShort));
    }

    #[test]
    fn empty_position_after_prefix() {
        assert_eq!(
            decode("XX&12&"),
            Err(DecodeError::InvalidPosition("".to_owned()))
        );
    }

    #[test]
    fn bad_integers() {
        assert_eq!(
            decode("XX1a&12&"),
            Err(DecodeError::InvalidPosition("1a".to_owned()))
        );
        assert_eq!(
            decode("XX3&12cm&"),
            Err(DecodeError::InvalidDistance("12cm".to_owned()))
        );
        assert_eq!(
            decode("XX3&&"),
            Err(DecodeError::InvalidDistance("".to_owned()))
        );
    }

    #[test]
    fn raw_bytes() {
        assert_eq!(
            decode_bytes(b"XX4&250&\n"),
            Ok(RangingSample {
                position: 4,
                distance: 250
            })
        );
        assert_eq!(decode_bytes(&[0xff, 0xfe]), Err(DecodeError::NotUtf8));
    }
}
