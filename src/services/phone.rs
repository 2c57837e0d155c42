use regex::Regex;
use std::sync::OnceLock;

/// Normalize a caller number to E.164.
///
/// Strips whitespace, dashes and parens, then ensures a leading `+`.
/// Bare 10-digit numbers are assumed to be US.
pub fn normalize_e164(phone: &str) -> String {
    static NON_DIGIT_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = NON_DIGIT_REGEX.get_or_init(|| Regex::new(r"[^\d+]").expect("Invalid Regex"));
    let digits = re.replace_all(phone.trim(), "").to_string();

    if digits.starts_with('+') {
        return digits;
    }
    if digits.len() == 10 {
        return format!("+1{}", digits);
    }
    if digits.len() == 11 && digits.starts_with('1') {
        return format!("+{}", digits);
    }
    format!("+{}", digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_us_number() {
        assert_eq!(normalize_e164("+1 (415) 555-0100"), "+14155550100");
    }

    #[test]
    fn test_dashed_ten_digits() {
        assert_eq!(normalize_e164("415-555-0100"), "+14155550100");
    }

    #[test]
    fn test_eleven_digits_with_country_code() {
        assert_eq!(normalize_e164("14155550100"), "+14155550100");
    }

    #[test]
    fn test_already_normalized() {
        assert_eq!(normalize_e164("+14155550100"), "+14155550100");
    }

    #[test]
    fn test_idempotent() {
        for input in ["+1 (415) 555-0100", "415-555-0100", "+442071838750"] {
            let once = normalize_e164(input);
            assert_eq!(normalize_e164(&once), once);
        }
    }

    #[test]
    fn test_international_passthrough() {
        assert_eq!(normalize_e164("442071838750"), "+442071838750");
    }
}
