//! Text decoding for INF descriptors
//!
//! Vendor INFs ship as ASCII/UTF-8, UTF-16LE with BOM, and not infrequently
//! UTF-16 without any BOM. Decoding is best-effort: invalid sequences are
//! replaced, never fatal.

/// Share of NUL bytes above which BOM-less input is treated as UTF-16
const UTF16_NUL_RATIO: f64 = 0.2;

/// Decode raw INF bytes into text
pub fn decode_inf_bytes(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, true);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, false);
    }

    if bytes.len() >= 2 && nul_ratio(bytes) > UTF16_NUL_RATIO {
        // ASCII text in UTF-16LE puts the NUL in the odd byte
        let odd_nuls = bytes.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
        let even_nuls = bytes.iter().step_by(2).filter(|b| **b == 0).count();
        return decode_utf16(bytes, odd_nuls >= even_nuls);
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn nul_ratio(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    bytes.iter().filter(|b| **b == 0).count() as f64 / bytes.len() as f64
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            if little_endian {
                u16::from_le_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], chunk[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(text: &str, little_endian: bool) -> Vec<u8> {
        text.encode_utf16()
            .flat_map(|u| {
                if little_endian {
                    u.to_le_bytes()
                } else {
                    u.to_be_bytes()
                }
            })
            .collect()
    }

    #[test]
    fn test_utf8_with_and_without_bom() {
        assert_eq!(decode_inf_bytes(b"[Version]"), "[Version]");
        assert_eq!(decode_inf_bytes(b"\xEF\xBB\xBF[Version]"), "[Version]");
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut le = vec![0xFF, 0xFE];
        le.extend(utf16("[Strings]\r\n", true));
        assert_eq!(decode_inf_bytes(&le), "[Strings]\r\n");

        let mut be = vec![0xFE, 0xFF];
        be.extend(utf16("[Strings]\r\n", false));
        assert_eq!(decode_inf_bytes(&be), "[Strings]\r\n");
    }

    #[test]
    fn test_utf16_without_bom() {
        let text = "[Version]\r\nClass=Printer\r\n";
        assert_eq!(decode_inf_bytes(&utf16(text, true)), text);
        assert_eq!(decode_inf_bytes(&utf16(text, false)), text);
    }
}
