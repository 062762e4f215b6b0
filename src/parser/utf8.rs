//! UTF-8 Codec
//!
//! A small, table-driven UTF-8 decoder and encoder. The codec never fails:
//! malformed input degrades into U+FFFD with a well-defined number of
//! consumed bytes so the caller can always make progress, and a sequence cut
//! short by the end of the buffer is reported as incomplete so the caller can
//! keep the tail for the next read.

/// Maximum encoded length of a code point
pub const UTF_SIZ: usize = 4;

/// Replacement code point used for every malformed sequence
pub const UTF_INVALID: u32 = 0xFFFD;

const UTF_BYTE: [u8; UTF_SIZ + 1] = [0x80, 0x00, 0xC0, 0xE0, 0xF0];
const UTF_MASK: [u8; UTF_SIZ + 1] = [0xC0, 0x80, 0xE0, 0xF0, 0xF8];
const UTF_MIN: [u32; UTF_SIZ + 1] = [0, 0, 0x80, 0x800, 0x10000];
const UTF_MAX: [u32; UTF_SIZ + 1] = [0x10FFFF, 0x7F, 0x7FF, 0xFFFF, 0x10FFFF];

/// Result of decoding the front of a byte buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A code point (possibly U+FFFD) and the number of bytes it consumed
    Char(char, usize),
    /// The buffer ends inside a multi-byte sequence; holds the bytes seen so far
    Incomplete(usize),
}

/// Classify a byte: returns the payload bits and the length class.
///
/// Class 0 is a continuation byte, 1..=4 are lead bytes of that length and
/// 5 means the byte can never appear in UTF-8.
fn decode_byte(b: u8) -> (u32, usize) {
    for (class, (&mask, &byte)) in UTF_MASK.iter().zip(UTF_BYTE.iter()).enumerate() {
        if b & mask == byte {
            return (u32::from(b & !mask), class);
        }
    }
    (0, UTF_SIZ + 1)
}

/// Decode the first code point in `bytes`.
///
/// - empty input is `Incomplete(0)`
/// - an invalid lead byte is `Char(U+FFFD, 1)`
/// - a non-continuation byte inside a sequence yields U+FFFD consuming only
///   the bytes before it, so the offending byte starts the next decode
/// - a decoded value that is overlong, out of range or a surrogate yields
///   U+FFFD consuming the whole encoded length
pub fn decode(bytes: &[u8]) -> Decoded {
    let Some(&lead) = bytes.first() else {
        return Decoded::Incomplete(0);
    };

    let (mut value, len) = decode_byte(lead);
    if !(1..=UTF_SIZ).contains(&len) {
        return Decoded::Char(char::REPLACEMENT_CHARACTER, 1);
    }

    let mut have = 1;
    while have < len {
        let Some(&b) = bytes.get(have) else {
            return Decoded::Incomplete(have);
        };
        let (bits, class) = decode_byte(b);
        if class != 0 {
            return Decoded::Char(char::REPLACEMENT_CHARACTER, have);
        }
        value = (value << 6) | bits;
        have += 1;
    }

    let (value, _) = validate(value, len);
    Decoded::Char(to_char(value), len)
}

/// Clamp `u` into the legal range for length class `i`.
///
/// Returns the (possibly replaced) code point and the number of bytes needed
/// to encode it. Class 0 accepts the whole Unicode range.
pub fn validate(u: u32, i: usize) -> (u32, usize) {
    let class = i.min(UTF_SIZ);
    let u = if u < UTF_MIN[class] || u > UTF_MAX[class] || (0xD800..=0xDFFF).contains(&u) {
        UTF_INVALID
    } else {
        u
    };

    let mut len = 1;
    while u > UTF_MAX[len] {
        len += 1;
    }
    (u, len)
}

/// Encode `u` into `buf`, returning the written prefix.
///
/// Invalid code points are replaced by U+FFFD before encoding.
pub fn encode(u: u32, buf: &mut [u8; UTF_SIZ]) -> &[u8] {
    let (mut u, len) = validate(u, 0);

    for i in (1..len).rev() {
        buf[i] = UTF_BYTE[0] | (u as u8 & !UTF_MASK[0]);
        u >>= 6;
    }
    buf[0] = UTF_BYTE[len] | (u as u8 & !UTF_MASK[len]);

    &buf[..len]
}

/// Encode a `char` into `buf`
pub fn encode_char(c: char, buf: &mut [u8; UTF_SIZ]) -> &[u8] {
    encode(u32::from(c), buf)
}

fn to_char(u: u32) -> char {
    char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER)
}
