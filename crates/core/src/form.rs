use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::money::{Money, MoneyParseError};

/// Raw `application/x-www-form-urlencoded` submission.
pub type FormData = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// One or more fields of a submission were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("validation failed for {} field(s)", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }
}

/// Reads typed values out of a form, collecting every failure instead of
/// stopping at the first one.
///
/// Accessors return a placeholder value on failure; callers must check
/// [`FormReader::finish`] before using the results.
pub struct FormReader<'a> {
    form: &'a FormData,
    errors: Vec<FieldError>,
}

impl<'a> FormReader<'a> {
    pub fn new(form: &'a FormData) -> Self {
        Self {
            form,
            errors: Vec::new(),
        }
    }

    fn raw(&self, name: &str) -> Option<&'a str> {
        self.form
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn fail(&mut self, name: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: name.to_string(),
            message: message.into(),
        });
    }

    pub fn required_text(&mut self, name: &str, max_len: usize) -> String {
        match self.optional_text(name, max_len) {
            Some(value) => value,
            None => {
                if !self.errors.iter().any(|error| error.field == name) {
                    self.fail(name, "This field is required.");
                }
                String::new()
            }
        }
    }

    pub fn optional_text(&mut self, name: &str, max_len: usize) -> Option<String> {
        let value = self.raw(name)?;
        if value.chars().count() > max_len {
            self.fail(name, format!("Must be at most {max_len} characters."));
            return None;
        }
        Some(value.to_string())
    }

    pub fn email(&mut self, name: &str) -> String {
        let value = self.required_text(name, 254);
        if value.is_empty() {
            return value;
        }
        let valid = value
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !valid {
            self.fail(name, "Enter a valid email address.");
        }
        value.to_lowercase()
    }

    pub fn non_negative_integer(&mut self, name: &str) -> i64 {
        let Some(raw) = self.raw(name) else {
            self.fail(name, "This field is required.");
            return 0;
        };
        match raw.parse::<i64>() {
            Ok(value) if value >= 0 => value,
            Ok(_) => {
                self.fail(name, "Must not be negative.");
                0
            }
            Err(_) => {
                self.fail(name, "Enter a whole number.");
                0
            }
        }
    }

    pub fn money(&mut self, name: &str) -> Money {
        if self.raw(name).is_none() {
            self.fail(name, "This field is required.");
            return Money::ZERO;
        }
        self.optional_money(name).unwrap_or(Money::ZERO)
    }

    pub fn optional_money(&mut self, name: &str) -> Option<Money> {
        let raw = self.raw(name)?;
        match raw.parse::<Money>() {
            Ok(value) if value.is_negative() => {
                self.fail(name, "Must not be negative.");
                None
            }
            Ok(value) => Some(value),
            Err(MoneyParseError::TooPrecise) => {
                self.fail(name, "Use at most two decimal places.");
                None
            }
            Err(_) => {
                self.fail(name, "Enter an amount such as 12.50.");
                None
            }
        }
    }

    /// Identifier of a referenced record, as submitted by a select box.
    pub fn reference(&mut self, name: &str) -> i64 {
        let Some(raw) = self.raw(name) else {
            self.fail(name, "Select a value.");
            return 0;
        };
        match raw.parse::<i64>() {
            Ok(value) if value > 0 => value,
            _ => {
                self.fail(name, "Select a valid value.");
                0
            }
        }
    }

    /// HTML checkboxes are absent from the submission when unchecked.
    pub fn checkbox(&self, name: &str) -> bool {
        matches!(
            self.raw(name).map(str::to_ascii_lowercase).as_deref(),
            Some("on" | "true" | "1" | "yes")
        )
    }

    pub fn choice<T: Default>(&mut self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> T {
        let Some(raw) = self.raw(name) else {
            self.fail(name, "Select a value.");
            return T::default();
        };
        match parse(raw) {
            Some(value) => value,
            None => {
                self.fail(name, format!("'{raw}' is not a valid choice."));
                T::default()
            }
        }
    }

    /// Accepts `datetime-local` input values (`2024-05-01T09:30`, optionally
    /// with seconds and milliseconds) interpreted as UTC, or full RFC 3339
    /// timestamps.
    pub fn optional_timestamp(&mut self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.raw(name)?;
        if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
            return Some(value.with_timezone(&Utc));
        }
        for format in [
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(value.and_utc());
            }
        }
        self.fail(name, "Enter a date and time such as 2024-05-01T09:30.");
        None
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn collects_every_failure() {
        let data = form(&[("name", "  "), ("stock", "-2"), ("price", "abc")]);
        let mut reader = FormReader::new(&data);
        reader.required_text("name", 10);
        reader.non_negative_integer("stock");
        reader.money("price");
        let err = reader.finish().expect_err("should fail");

        assert_eq!(err.errors.len(), 3);
        assert_eq!(err.message_for("name"), Some("This field is required."));
        assert_eq!(err.message_for("stock"), Some("Must not be negative."));
        assert!(err.message_for("price").is_some());
    }

    #[test]
    fn text_is_trimmed_and_length_checked() {
        let data = form(&[("name", "  Books "), ("long", "abcdef")]);
        let mut reader = FormReader::new(&data);
        assert_eq!(reader.required_text("name", 10), "Books");
        assert_eq!(reader.optional_text("long", 3), None);
        let err = reader.finish().unwrap_err();
        assert_eq!(err.message_for("long"), Some("Must be at most 3 characters."));
    }

    #[test]
    fn too_long_required_text_reports_once() {
        let data = form(&[("name", "abcdef")]);
        let mut reader = FormReader::new(&data);
        reader.required_text("name", 3);
        assert_eq!(reader.finish().unwrap_err().errors.len(), 1);
    }

    #[test]
    fn datetime_local_values_keep_milliseconds() {
        let data = form(&[("at", "2024-03-01T12:30:45.123")]);
        let mut reader = FormReader::new(&data);
        let at = reader.optional_timestamp("at").expect("parsed");
        assert_eq!(at.timestamp_subsec_millis(), 123);
        assert_eq!(at.format("%H:%M:%S").to_string(), "12:30:45");
    }

    #[test]
    fn email_requires_domain() {
        let data = form(&[("good", "Ann@Example.com"), ("bad", "ann@localhost")]);
        let mut reader = FormReader::new(&data);
        assert_eq!(reader.email("good"), "ann@example.com");
        reader.email("bad");
        let err = reader.finish().unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "bad");
    }

    #[test]
    fn checkbox_absent_means_false() {
        let data = form(&[("vip", "on")]);
        let reader = FormReader::new(&data);
        assert!(reader.checkbox("vip"));
        assert!(!reader.checkbox("missing"));
    }

    #[test]
    fn parses_datetime_local_values() {
        let data = form(&[("at", "2024-05-01T09:30"), ("bad", "yesterday")]);
        let mut reader = FormReader::new(&data);
        let at = reader.optional_timestamp("at").expect("parsed");
        assert_eq!(at.to_rfc3339(), "2024-05-01T09:30:00+00:00");
        assert_eq!(reader.optional_timestamp("missing"), None);
        assert_eq!(reader.optional_timestamp("bad"), None);
        assert_eq!(reader.finish().unwrap_err().errors.len(), 1);
    }

    #[test]
    fn reference_rejects_non_positive_ids() {
        let data = form(&[("category_id", "0")]);
        let mut reader = FormReader::new(&data);
        reader.reference("category_id");
        reader.reference("missing");
        assert_eq!(reader.finish().unwrap_err().errors.len(), 2);
    }
}
