/// Normalize a phone number to international digits as the WhatsApp API
/// expects: `+` and `00` prefixes stripped, Egyptian local numbers
/// (`01xxxxxxxxx`) rewritten to `201xxxxxxxxx`. A trunk zero kept after the
/// country code (`+20 010...`) is dropped.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let mut international = if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if digits.starts_with("01") && digits.len() == 11 {
        format!("2{}", digits)
    } else if digits.starts_with('1') && digits.len() == 10 {
        format!("20{}", digits)
    } else {
        digits
    };
    if international.len() == 13 && international.starts_with("2001") {
        international.remove(2);
    }

    if (8..=15).contains(&international.len()) && !international.starts_with('0') {
        Some(international)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egyptian_local_numbers_get_country_code() {
        assert_eq!(normalize_phone("01012345678").as_deref(), Some("201012345678"));
        assert_eq!(normalize_phone("010 1234 5678").as_deref(), Some("201012345678"));
        assert_eq!(normalize_phone("1012345678").as_deref(), Some("201012345678"));
    }

    #[test]
    fn international_prefixes_are_stripped() {
        assert_eq!(normalize_phone("+201012345678").as_deref(), Some("201012345678"));
        assert_eq!(normalize_phone("00201012345678").as_deref(), Some("201012345678"));
        assert_eq!(normalize_phone("+966 50 123 4567").as_deref(), Some("966501234567"));
    }

    #[test]
    fn trunk_zero_after_country_code_is_dropped() {
        assert_eq!(normalize_phone("+2001012345678").as_deref(), Some("201012345678"));
        assert_eq!(normalize_phone("002001012345678").as_deref(), Some("201012345678"));
        assert_eq!(normalize_phone("+20 010 1234 5678").as_deref(), Some("201012345678"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("0123456789"), None);
    }
}
