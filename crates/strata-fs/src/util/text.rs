//! Conversions between UTF-8 and fixed-width encodings.
//!
//! Outputs are owned and sized by the conversion itself. Code points that
//! the target encoding cannot represent become `?`, matching what archive
//! formats with legacy filename encodings expect.

const REPLACEMENT: char = '?';

/// Decode UCS-4 code points. Invalid scalars become `?`; a NUL terminates.
pub fn utf8_from_ucs4(src: &[u32]) -> String {
    src.iter()
        .take_while(|&&cp| cp != 0)
        .map(|&cp| char::from_u32(cp).unwrap_or(REPLACEMENT))
        .collect()
}

pub fn utf8_to_ucs4(src: &str) -> Vec<u32> {
    src.chars().map(u32::from).collect()
}

/// Decode UCS-2. Surrogates are not pairs in UCS-2 and become `?`.
pub fn utf8_from_ucs2(src: &[u16]) -> String {
    src.iter()
        .take_while(|&&unit| unit != 0)
        .map(|&unit| char::from_u32(u32::from(unit)).unwrap_or(REPLACEMENT))
        .collect()
}

/// Encode as UCS-2; characters outside the Basic Multilingual Plane become `?`.
pub fn utf8_to_ucs2(src: &str) -> Vec<u16> {
    src.chars()
        .map(|c| u16::try_from(u32::from(c)).unwrap_or(REPLACEMENT as u16))
        .collect()
}

/// Decode UTF-16, replacing unpaired surrogates with `?`.
pub fn utf8_from_utf16(src: &[u16]) -> String {
    let end = src.iter().position(|&u| u == 0).unwrap_or(src.len());
    char::decode_utf16(src[..end].iter().copied())
        .map(|r| r.unwrap_or(REPLACEMENT))
        .collect()
}

pub fn utf8_to_utf16(src: &str) -> Vec<u16> {
    src.encode_utf16().collect()
}

/// Every Latin-1 byte maps to the code point of the same value.
pub fn utf8_from_latin1(src: &[u8]) -> String {
    src.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

/// Encode as Latin-1; characters above U+00FF become `?`.
pub fn utf8_to_latin1(src: &str) -> Vec<u8> {
    src.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT as u8))
        .collect()
}

/// Case-insensitive comparison of two UTF-8 strings using simple case folding.
pub fn utf8_stricmp(a: &str, b: &str) -> std::cmp::Ordering {
    let fold = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    fold(a).cmp(&fold(b))
}

/// Longest prefix of `src` that fits in `max_bytes` without splitting a
/// character.
pub fn truncate_utf8(src: &str, max_bytes: usize) -> &str {
    if src.len() <= max_bytes {
        return src;
    }
    let mut end = max_bytes;
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    &src[..end]
}
