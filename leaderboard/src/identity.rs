// Copyright (c) 2024 Botho Foundation

//! Player identity format
//!
//! Players are keyed by an EVM-style account address: the literal `0x`
//! followed by 40 hex digits (20 bytes). Either letter case is accepted;
//! no checksum is enforced and the string is stored exactly as submitted.

/// Prefix every identity must start with
pub const IDENTITY_PREFIX: &str = "0x";

/// Number of hex digits after the prefix (20 bytes)
pub const IDENTITY_HEX_LEN: usize = 40;

/// Total length of a well-formed identity
pub const IDENTITY_LEN: usize = IDENTITY_PREFIX.len() + IDENTITY_HEX_LEN;

/// Check whether `s` looks like an account address.
///
/// Total function: any deviation (length, prefix, non-hex digit) is `false`.
pub fn is_valid_identity(s: &str) -> bool {
    if s.len() != IDENTITY_LEN {
        return false;
    }

    match s.strip_prefix(IDENTITY_PREFIX) {
        Some(digits) => digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_lowercase() {
        let id = format!("0x{}", "a".repeat(40));
        assert!(is_valid_identity(&id));
    }

    #[test]
    fn test_valid_mixed_case() {
        assert!(is_valid_identity("0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(is_valid_identity("0xde709f2102306220921060314715629080e2fb77"));
    }

    #[test]
    fn test_wrong_length() {
        assert!(!is_valid_identity(&format!("0x{}", "a".repeat(39))));
        assert!(!is_valid_identity(&format!("0x{}", "a".repeat(41))));
        assert!(!is_valid_identity("0x"));
        assert!(!is_valid_identity(""));
    }

    #[test]
    fn test_non_hex_digits() {
        assert!(!is_valid_identity(&format!("0x{}", "Z".repeat(40))));
        assert!(!is_valid_identity(&format!("0x{}g", "0".repeat(39))));
        assert!(!is_valid_identity(&format!("0x{} ", "0".repeat(39))));
    }

    #[test]
    fn test_wrong_prefix() {
        assert!(!is_valid_identity(&format!("0X{}", "a".repeat(40))));
        assert!(!is_valid_identity(&format!("1x{}", "a".repeat(40))));
        // Right length, no prefix at all
        assert!(!is_valid_identity(&"a".repeat(42)));
    }

    #[test]
    fn test_multibyte_input_same_byte_length() {
        // 42 bytes but not ASCII hex
        let s = format!("0x{}é", "a".repeat(38));
        assert_eq!(s.len(), 42);
        assert!(!is_valid_identity(&s));
    }

    #[test]
    fn test_player_names_rejected() {
        assert!(!is_valid_identity("mario"));
        assert!(!is_valid_identity("Player One"));
    }
}
