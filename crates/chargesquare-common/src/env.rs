//! Typed environment lookups
//!
//! Configuration in every ChargeSquare binary comes from the process
//! environment (optionally seeded from a `.env` file). These helpers keep the
//! `std::env::var(..).ok().and_then(..)` chains out of the config modules and
//! turn unparsable values into errors instead of silently falling back.

use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Returns the variable's value, or `None` when it is unset or blank.
pub fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Returns the variable's value or `default` when it is unset.
pub fn string_or(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

/// Parses the variable into `T`, using `default` when it is unset.
pub fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| CommonError::invalid_env(name, raw.clone(), e)),
        None => Ok(default),
    }
}

/// Splits a comma-separated variable into trimmed, non-empty items.
pub fn list_or(name: &str, default: &[&str]) -> Vec<String> {
    match optional(name) {
        Some(raw) => raw
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        None => default.iter().map(|item| item.to_string()).collect(),
    }
}
