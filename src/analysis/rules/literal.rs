//! Spelling-level classification of numeric constants.

use crate::parser::types::is_floating_literal;

/// Trailing suffix letters: `u`/`l` for integers, `f`/`l` for floating constants
pub fn suffix(spelling: &str) -> &str {
    let floating = is_floating_literal(spelling);
    let is_suffix = |c: char| {
        if floating {
            matches!(c, 'f' | 'F' | 'l' | 'L')
        } else {
            matches!(c, 'u' | 'U' | 'l' | 'L')
        }
    };
    let start = spelling
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_suffix(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(spelling.len());
    &spelling[start..]
}

pub fn is_hex(spelling: &str) -> bool {
    spelling.starts_with("0x") || spelling.starts_with("0X")
}

/// `0` followed by at least one more digit; hex, binary, floating constants and a lone
/// `0` are not octal
pub fn is_octal(spelling: &str) -> bool {
    if is_floating_literal(spelling) {
        return false;
    }
    let digits = &spelling[..spelling.len() - suffix(spelling).len()];
    digits.len() >= 2
        && digits.starts_with('0')
        && digits[1..].chars().all(|c| c.is_ascii_digit())
}

pub fn has_lowercase_suffix(spelling: &str) -> bool {
    suffix(spelling).chars().any(|c| c.is_ascii_lowercase())
}

pub fn has_unsigned_suffix(spelling: &str) -> bool {
    suffix(spelling).contains('U')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix() {
        assert_eq!(suffix("10"), "");
        assert_eq!(suffix("10uL"), "uL");
        assert_eq!(suffix("0xffU"), "U");
        assert_eq!(suffix("0xff"), "");
        assert_eq!(suffix("1.5f"), "f");
        assert_eq!(suffix("1e5L"), "L");
    }

    #[test]
    fn test_octal() {
        assert!(is_octal("010"));
        assert!(is_octal("00"));
        assert!(is_octal("017UL"));
        assert!(!is_octal("0"));
        assert!(!is_octal("0U"));
        assert!(!is_octal("0x10"));
        assert!(!is_octal("0b101"));
        assert!(!is_octal("0.5"));
        assert!(!is_octal("10"));
    }

    #[test]
    fn test_suffix_case() {
        assert!(has_lowercase_suffix("10l"));
        assert!(has_lowercase_suffix("10Ul"));
        assert!(has_lowercase_suffix("2.0f"));
        assert!(!has_lowercase_suffix("10L"));
        assert!(!has_lowercase_suffix("0xff"));
        assert!(!has_lowercase_suffix("10"));
        assert!(has_unsigned_suffix("010UL"));
        assert!(!has_unsigned_suffix("010u"));
    }
}
