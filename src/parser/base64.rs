//! Base64 decoding for clipboard (OSC 52) payloads
//!
//! Lenient in the way terminal payloads need: non-printable bytes (line
//! breaks inserted by some programs) are skipped and a missing tail is
//! treated as padding. Characters outside the alphabet are rejected.

use thiserror::Error;

/// Error returned for a payload containing a character outside the alphabet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid base64 character {byte:#04x} at offset {offset}")]
pub struct Base64Error {
    pub byte: u8,
    pub offset: usize,
}

/// Sextet value of `b`, `None` for padding
fn digit(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

fn is_print(b: u8) -> bool {
    (0x20..0x7f).contains(&b)
}

/// Decode `src`, stopping at the first padding character
pub fn decode(src: &[u8]) -> Result<Vec<u8>, Base64Error> {
    let mut out = Vec::with_capacity(src.len().div_ceil(4) * 3);
    let mut pos = 0;

    // Next significant character, or padding once the input is exhausted
    let next = |pos: &mut usize| -> Result<Option<u8>, Base64Error> {
        while *pos < src.len() && !is_print(src[*pos]) {
            *pos += 1;
        }
        let Some(&b) = src.get(*pos) else {
            return Ok(None);
        };
        *pos += 1;
        if b == b'=' {
            return Ok(None);
        }
        digit(b).map(Some).ok_or(Base64Error {
            byte: b,
            offset: *pos - 1,
        })
    };

    while pos < src.len() {
        let a = next(&mut pos)?;
        let b = next(&mut pos)?;
        let c = next(&mut pos)?;
        let d = next(&mut pos)?;

        let (Some(a), Some(b)) = (a, b) else {
            break;
        };
        out.push((a << 2) | ((b & 0x30) >> 4));
        let Some(c) = c else {
            break;
        };
        out.push(((b & 0x0f) << 4) | ((c & 0x3c) >> 2));
        let Some(d) = d else {
            break;
        };
        out.push(((c & 0x03) << 6) | d);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        assert_eq!(decode(b"aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode(b"aGVsbG8gd29ybGQ=").unwrap(), b"hello world");
        assert_eq!(decode(b"YWJj").unwrap(), b"abc");
    }

    #[test]
    fn test_decode_missing_padding() {
        assert_eq!(decode(b"aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode(b"YQ").unwrap(), b"a");
    }

    #[test]
    fn test_decode_skips_line_breaks() {
        assert_eq!(decode(b"aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(decode(b"\r\nYWJj").unwrap(), b"abc");
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_decode_invalid() {
        let err = decode(b"aGV*bG8=").unwrap_err();
        assert_eq!(err.byte, b'*');
        assert_eq!(err.offset, 3);
        assert!(decode(b"?").is_err());
    }
}
