use once_cell::sync::Lazy;
use regex::Regex;

pub fn is_ascii_no_spaces(username: &str) -> Result<(), String> {
    match username.chars().all(|c| c.is_ascii() && !c.is_whitespace()) {
        true => Ok(()),
        false => Err("should be an ascii string without spaces".to_string()),
    }
}

pub fn is_valid_email(string: &str) -> Result<(), String> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
    });
    match RE.is_match(string) {
        true => Ok(()),
        false => Err("invalid email".to_string()),
    }
}

/// Booth codes are normalised to upper case before validation and storage,
/// so that judges can type them in any case.
pub fn normalize_booth_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn is_valid_booth_code(code: &str) -> Result<(), String> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Z0-9-]{2,16}$").unwrap());
    match RE.is_match(code) {
        true => Ok(()),
        false => Err(
            "booth codes should be 2-16 characters of A-Z, 0-9 and '-'"
                .to_string(),
        ),
    }
}

pub fn is_valid_pin(pin: &str) -> Result<(), String> {
    match pin.len() == 6 && pin.chars().all(|c| c.is_ascii_digit()) {
        true => Ok(()),
        false => Err("a PIN is six digits".to_string()),
    }
}

pub fn is_valid_name(name: &str) -> Result<(), String> {
    match (1..=64).contains(&name.trim().chars().count()) {
        true => Ok(()),
        false => Err("names should be between 1 and 64 characters".to_string()),
    }
}

#[cfg(test)]
#[test]
fn test_email() {
    assert!(is_valid_email("hello@example.com").is_ok());
    assert!(is_valid_email("not an email").is_err());
}

#[cfg(test)]
#[test]
fn test_booth_codes() {
    assert_eq!(normalize_booth_code(" game-01 "), "GAME-01");
    assert!(is_valid_booth_code("GAME-01").is_ok());
    assert!(is_valid_booth_code("G").is_err());
    assert!(is_valid_booth_code("GAME 01").is_err());
}

#[cfg(test)]
#[test]
fn test_pins() {
    assert!(is_valid_pin("042137").is_ok());
    assert!(is_valid_pin("4213").is_err());
    assert!(is_valid_pin("04213a").is_err());
}
