//! Content-Type and Content-Disposition header fields.

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g. "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g. "plain", "html", "mixed").
    pub sub_type: String,
    /// Parameters (charset, boundary, name, ...), keys lowercased.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a content type without parameters.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// The default `text/plain; charset=utf-8` type assumed for untyped parts.
    #[must_use]
    pub fn text_plain() -> Self {
        let mut ct = Self::new("text", "plain");
        ct.parameters
            .insert("charset".to_string(), "utf-8".to_string());
        ct
    }

    /// Parses a `type/subtype; param=value; ...` field.
    ///
    /// # Errors
    ///
    /// Returns an error if the type/subtype pair is malformed.
    pub fn parse(value: &str) -> Result<Self> {
        let mut sections = value.split(';');

        let essence = sections
            .next()
            .ok_or_else(|| Error::InvalidContentType("Empty content type".to_string()))?
            .trim();

        let (main_type, sub_type) = essence
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {essence:?}")))?;

        if main_type.trim().is_empty() || sub_type.trim().is_empty() {
            return Err(Error::InvalidContentType(essence.to_string()));
        }

        let mut ct = Self::new(
            main_type.trim().to_lowercase(),
            sub_type.trim().to_lowercase(),
        );
        ct.parameters = parse_parameters(sections);
        Ok(ct)
    }

    /// Returns `"type/subtype"` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks the type/subtype pair, ignoring case.
    #[must_use]
    pub fn matches(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type) && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the multipart boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns the (legacy) name parameter if present, RFC 2047-decoded.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.parameters.get("name").map(|n| decode_rfc2047(n))
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        write_parameters(f, &self.parameters)
    }
}

/// Disposition of a message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed inline with the message body.
    Inline,
    /// Delivered as a named attachment.
    Attachment,
    /// Any non-standard disposition token.
    Other(String),
}

/// Parsed Content-Disposition field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition token.
    pub kind: DispositionKind,
    /// Parameters (filename, size, ...), keys lowercased.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a `disposition; param=value; ...` field.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut sections = value.split(';');
        let token = sections.next().unwrap_or_default().trim().to_lowercase();

        let kind = match token.as_str() {
            "inline" => DispositionKind::Inline,
            "attachment" => DispositionKind::Attachment,
            _ => DispositionKind::Other(token),
        };

        Self {
            kind,
            parameters: parse_parameters(sections),
        }
    }

    /// Checks if the part was marked as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionKind::Attachment
    }

    /// Returns the filename parameter if present, RFC 2047-decoded.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters.get("filename").map(|n| decode_rfc2047(n))
    }
}

/// Parses the `key=value` sections shared by Content-Type and
/// Content-Disposition. Values may be double-quoted.
fn parse_parameters<'a>(sections: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut parameters = HashMap::new();
    for section in sections {
        if let Some((key, value)) = section.trim().split_once('=') {
            parameters.insert(
                key.trim().to_lowercase(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    }
    parameters
}

fn write_parameters(f: &mut fmt::Formatter<'_>, parameters: &HashMap<String, String>) -> fmt::Result {
    let mut sorted: Vec<_> = parameters.iter().collect();
    sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (key, value) in sorted {
        if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
            write!(f, "; {key}=\"{value}\"")?;
        } else {
            write!(f, "; {key}={value}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_type() {
        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert!(ct.matches("text", "plain"));
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.essence(), "text/plain");
    }

    #[test]
    fn parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_42\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part_42"));
    }

    #[test]
    fn parse_uppercases_normalized() {
        let ct = ContentType::parse("TEXT/HTML").unwrap();
        assert!(ct.matches("text", "html"));
        assert!(ct.is_text());
    }

    #[test]
    fn parse_rejects_missing_subtype() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("/plain").is_err());
    }

    #[test]
    fn name_parameter_is_decoded() {
        let ct = ContentType::parse("application/pdf; name==?utf-8?Q?r=C3=A9sum=C3=A9.pdf?=").unwrap();
        assert_eq!(ct.name(), Some("résumé.pdf".to_string()));
    }

    #[test]
    fn display_quotes_values_with_specials() {
        let mut ct = ContentType::new("multipart", "mixed");
        ct.parameters
            .insert("boundary".to_string(), "a b".to_string());
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"a b\"");
    }

    #[test]
    fn disposition_attachment_with_filename() {
        let cd = ContentDisposition::parse("attachment; filename=\"report.pdf\"");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename(), Some("report.pdf".to_string()));
    }

    #[test]
    fn disposition_inline() {
        let cd = ContentDisposition::parse("inline");
        assert_eq!(cd.kind, DispositionKind::Inline);
        assert!(!cd.is_attachment());
        assert!(cd.filename().is_none());
    }

    #[test]
    fn disposition_unknown_token() {
        let cd = ContentDisposition::parse("form-data; name=field");
        assert_eq!(cd.kind, DispositionKind::Other("form-data".to_string()));
    }
}
