//! Field-level rules shared by every schema.

use std::fmt::Display;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
    pub static ref SKU_RE: Regex = Regex::new(r"^[A-Z0-9\-]{3,32}$").unwrap();
    pub static ref EMPLOYEE_ID_RE: Regex = Regex::new(r"^[A-Z]{2,4}-[0-9]{3,6}$").unwrap();
}

/// Implemented by every request body before it touches the database.
pub trait Validate {
    fn validate(&self) -> AppResult<()>;
}

/// Character-count bounds on a required string (after trimming).
pub fn length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let n = value.trim().chars().count();
    if n < min || n > max {
        return Err(AppError::invalid_field(
            field,
            format!("must be between {} and {} characters, got {}", min, max, n),
        ));
    }
    Ok(())
}

pub fn max_length(field: &str, value: Option<&str>, max: usize) -> AppResult<()> {
    if let Some(v) = value {
        let n = v.chars().count();
        if n > max {
            return Err(AppError::invalid_field(field, format!("must be at most {} characters, got {}", max, n)));
        }
    }
    Ok(())
}

pub fn range<T: PartialOrd + Display + Copy>(field: &str, value: T, min: T, max: T) -> AppResult<()> {
    if value < min || value > max {
        return Err(AppError::invalid_field(field, format!("must be between {} and {}, got {}", min, max, value)));
    }
    Ok(())
}

pub fn positive(field: &str, value: f64, max: f64) -> AppResult<()> {
    if !value.is_finite() || value <= 0.0 || value > max {
        return Err(AppError::invalid_field(field, format!("must be greater than 0 and at most {}", max)));
    }
    Ok(())
}

pub fn email(field: &str, value: &str) -> AppResult<()> {
    if value.len() > 254 || !EMAIL_RE.is_match(value) {
        return Err(AppError::invalid_field(field, "must be a valid email address"));
    }
    Ok(())
}

pub fn phone(field: &str, value: &str) -> AppResult<()> {
    if !PHONE_RE.is_match(value) {
        return Err(AppError::invalid_field(field, "must be 7-15 digits with an optional leading '+'"));
    }
    Ok(())
}

pub fn pattern(field: &str, value: &str, re: &Regex, hint: &str) -> AppResult<()> {
    if !re.is_match(value) {
        return Err(AppError::invalid_field(field, format!("must match {}", hint)));
    }
    Ok(())
}

/// Bounds on a list's size and on each entry's length.
pub fn string_list(field: &str, items: &[String], min: usize, max: usize, item_max: usize) -> AppResult<()> {
    if items.len() < min || items.len() > max {
        return Err(AppError::invalid_field(
            field,
            format!("must contain between {} and {} entries, got {}", min, max, items.len()),
        ));
    }
    for item in items {
        if item.trim().is_empty() {
            return Err(AppError::invalid_field(field, "entries must not be blank"));
        }
        if item.chars().count() > item_max {
            return Err(AppError::invalid_field(field, format!("entries must be at most {} characters", item_max)));
        }
    }
    Ok(())
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trims entries and drops duplicates while keeping first-seen order.
pub fn dedup_trimmed(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let t = item.trim().to_string();
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

/// Empty strings in optional fields are treated as absent.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rule() {
        assert!(email("email", "amina.otieno@agri.co.ke").is_ok());
        assert!(email("email", "a+b@x.io").is_ok());
        assert!(email("email", "no-at-sign.com").is_err());
        assert!(email("email", "x@y").is_err());
        assert!(email("email", &format!("{}@x.com", "a".repeat(260))).is_err());
    }

    #[test]
    fn test_phone_rule() {
        assert!(phone("phone", "+254712345678").is_ok());
        assert!(phone("phone", "0712345678").is_ok());
        assert!(phone("phone", "12-34").is_err());
        assert!(phone("phone", "+1234567890123456").is_err());
    }

    #[test]
    fn test_length_counts_chars_after_trim() {
        assert!(length("name", "  Jo  ", 2, 10).is_ok());
        assert!(length("name", " J ", 2, 10).is_err());
        assert!(length("name", "Ñandú", 5, 5).is_ok());
    }

    #[test]
    fn test_range_and_positive() {
        assert!(range("rating", 5.0, 0.0, 5.0).is_ok());
        assert!(range("rating", 5.1, 0.0, 5.0).is_err());
        assert!(positive("price", 0.0, 10.0).is_err());
        assert!(positive("price", f64::NAN, 10.0).is_err());
        assert!(positive("price", 9.5, 10.0).is_ok());
    }

    #[test]
    fn test_string_list_rules() {
        let crops = vec!["maize".to_string(), "beans".to_string()];
        assert!(string_list("crops", &crops, 0, 20, 50).is_ok());
        assert!(string_list("crops", &crops, 3, 20, 50).is_err());
        assert!(string_list("crops", &["  ".to_string()], 0, 20, 50).is_err());
    }

    #[test]
    fn test_patterns() {
        assert!(pattern("sku", "SEED-001", &SKU_RE, "A-Z, 0-9, '-'").is_ok());
        assert!(pattern("sku", "seed-001", &SKU_RE, "A-Z, 0-9, '-'").is_err());
        assert!(pattern("employee_id", "AG-0042", &EMPLOYEE_ID_RE, "AA-000").is_ok());
        assert!(pattern("employee_id", "A-42", &EMPLOYEE_ID_RE, "AA-000").is_err());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(normalize_email("  Jane@Farm.COM "), "jane@farm.com");
        assert_eq!(
            dedup_trimmed(vec!["maize".into(), " maize ".into(), "tea".into()]),
            vec!["maize".to_string(), "tea".to_string()]
        );
        assert_eq!(blank_to_none(Some("   ".into())), None);
        assert_eq!(blank_to_none(Some(" x ".into())), Some("x".to_string()));
    }
}
