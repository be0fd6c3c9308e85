//! Typed readers for query-string parameters.
//!
//! Absent or empty keys fall back to the caller's default. A malformed
//! integer is recorded on the validator instead of being silently replaced.

use std::collections::HashMap;

use shared::Validator;

pub type QueryParams = HashMap<String, String>;

pub fn read_string(qs: &QueryParams, key: &str, default: &str) -> String {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

/// Comma-separated list; surrounding whitespace and empty items are dropped
pub fn read_csv(qs: &QueryParams, key: &str, default: &[&str]) -> Vec<String> {
    match qs.get(key) {
        Some(value) if !value.is_empty() => value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => default.iter().map(|item| item.to_string()).collect(),
    }
}

pub fn read_int(qs: &QueryParams, key: &str, default: i64, v: &mut Validator) -> i64 {
    let Some(value) = qs.get(key).filter(|value| !value.is_empty()) else {
        return default;
    };

    match value.parse::<i64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            v.add_error(key, "must be a valid integer");
            default
        }
    }
}
