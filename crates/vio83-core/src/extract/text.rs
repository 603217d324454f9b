//! Plain Text Extraction
//!
//! Decodes TXT/MD/RST bytes trying a fixed sequence of encodings; the first
//! clean decode wins. Latin-1 sits last because every byte sequence decodes
//! under it.

use super::{ExtractError, Result};

/// Decode text bytes: UTF-8, UTF-8 with BOM, windows-1252, then Latin-1.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(ExtractError::Failure {
            format: "txt".to_string(),
            reason: "empty file".to_string(),
        });
    }

    // UTF-8 with BOM
    if let Some(stripped) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        if let Ok(text) = std::str::from_utf8(stripped) {
            return Ok(text.to_string());
        }
    }

    // Plain UTF-8
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    // windows-1252 when it decodes without replacements
    let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if !had_errors {
        return Ok(decoded.into_owned());
    }

    // Latin-1 / ISO-8859-1: bytes map 1:1 onto code points
    Ok(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8() {
        assert_eq!(extract_text("caffè".as_bytes()).unwrap(), "caffè");
    }

    #[test]
    fn test_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"hello");
        assert_eq!(extract_text(&bytes).unwrap(), "hello");
    }

    #[test]
    fn test_windows_1252() {
        // 0xE8 is è in windows-1252 and invalid as a UTF-8 start
        let bytes = b"caff\xe8";
        assert_eq!(extract_text(bytes).unwrap(), "caffè");
    }

    #[test]
    fn test_empty_fails() {
        assert!(extract_text(&[]).is_err());
    }
}
