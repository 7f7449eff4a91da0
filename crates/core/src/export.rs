//! Bulk export of record sets.

use std::borrow::Cow;

use crate::schema::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_param(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim).unwrap_or("csv") {
            "" | "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Renders records with one column per schema field, headed by field labels.
pub fn to_csv<R: Resource>(records: &[R]) -> String {
    let fields = R::KIND.fields();
    let mut out = String::new();

    let header: Vec<_> = fields.iter().map(|field| escape_csv(field.label)).collect();
    out.push_str(&header.join(","));
    out.push_str("\r\n");

    for record in records {
        let row: Vec<String> = fields
            .iter()
            .map(|field| escape_csv(&record.value(field.name).export_value()).into_owned())
            .collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }

    out
}

pub fn to_json<R: Resource>(records: &[R]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Quotes a value when it contains a delimiter, quote or line break (RFC 4180).
fn escape_csv(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
