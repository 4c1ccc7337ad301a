//! RFC 5322 header block handling.

use crate::encoding::decode_rfc2047;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;

/// Collection of message headers with case-insensitive names.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for a header.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields
            .entry(name.into().to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Sets a header value, discarding any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields
            .insert(name.into().to_lowercase(), vec![value.into()]);
    }

    /// Returns the first value for a header, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_lowercase())
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns every value recorded for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .get(&name.to_lowercase())
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the first value for a header with RFC 2047 words decoded.
    #[must_use]
    pub fn decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_rfc2047)
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.remove(&name.to_lowercase());
    }

    /// Iterates over every `(name, value)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// Parses a raw header block.
    ///
    /// Continuation lines (leading space or tab) are unfolded into the
    /// preceding header with a single joining space. Parsing stops at the
    /// first empty line.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` return keeps room for stricter
    /// validation without an API break.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut pending: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = &mut pending {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = pending.take() {
                headers.add(name, value.trim().to_string());
            }

            if let Some((name, value)) = line.split_once(':') {
                pending = Some((name.trim().to_string(), value.trim().to_string()));
            }
        }

        if let Some((name, value)) = pending {
            headers.add(name, value.trim().to_string());
        }

        Ok(headers)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<_> = self.fields.iter().collect();
        sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, values) in sorted {
            let canonical = canonical_name(name);
            for value in values {
                writeln!(f, "{canonical}: {value}")?;
            }
        }

        Ok(())
    }
}

/// Restores conventional capitalization, e.g. `message-id` -> `Message-Id`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}
