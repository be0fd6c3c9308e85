//! Field-error accumulator used by every request validation path.
//!
//! A `Validator` is created fresh for each validation call and handed to the
//! rule functions by `&mut`. It never fails; it only records. The first
//! message recorded for a field is kept and later messages for the same field
//! are ignored.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Loose RFC 5322 shape check for email addresses
    pub static ref EMAIL_RX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Field name to error message, ordered by field name so responses are stable
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been recorded
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` under `field` unless the field already has an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Record `message` under `field` when `ok` is false
    pub fn check(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }

    /// `Ok(())` when valid, otherwise the accumulated field errors
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// True if `value` equals one of `candidates`
pub fn permitted_value<T: PartialEq>(value: &T, candidates: &[T]) -> bool {
    candidates.iter().any(|candidate| candidate == value)
}

/// True if no two elements of `values` are equal
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|value| seen.insert(value))
}

pub fn matches(value: &str, pattern: &Regex) -> bool {
    pattern.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validator_is_valid() {
        let v = Validator::new();
        assert!(v.valid());
        assert!(v.errors().is_empty());
    }

    #[test]
    fn test_check_records_only_failures() {
        let mut v = Validator::new();
        v.check(true, "title", "must be provided");
        assert!(v.valid());

        v.check(false, "year", "must be provided");
        assert!(!v.valid());
        assert_eq!(v.errors().get("year").map(String::as_str), Some("must be provided"));
    }

    #[test]
    fn test_first_error_for_field_wins() {
        let mut v = Validator::new();
        v.add_error("genres", "must contain at least 1 genre");
        v.add_error("genres", "must not contain duplicate values");
        v.check(false, "genres", "must be provided");

        let errors = v.into_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["genres"], "must contain at least 1 genre");
    }

    #[test]
    fn test_finish() {
        assert!(Validator::new().finish().is_ok());

        let mut v = Validator::new();
        v.add_error("sort", "invalid sort value");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors["sort"], "invalid sort value");
    }

    #[test]
    fn test_permitted_value() {
        let safelist = ["id", "title", "-id"];
        assert!(permitted_value(&"title", &safelist));
        assert!(!permitted_value(&"runtime", &safelist));
        assert!(permitted_value(&3, &[1, 2, 3]));
    }

    #[test]
    fn test_unique() {
        assert!(unique(&["drama", "comedy"]));
        assert!(!unique(&["drama", "comedy", "drama"]));
        assert!(unique::<String>(&[]));
    }

    #[test]
    fn test_matches_email() {
        assert!(matches("alice@example.com", &EMAIL_RX));
        assert!(!matches("alice@", &EMAIL_RX));
        assert!(!matches("not an email", &EMAIL_RX));
    }
}
