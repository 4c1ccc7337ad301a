//! MIME message structure and parsing.

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, Utc};
use std::fmt;

/// Content-Transfer-Encoding values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII (the default).
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
    /// Raw binary.
    Binary,
}

impl TransferEncoding {
    /// Parses a transfer encoding token. Unknown tokens fall back to 7bit,
    /// which decodes as identity.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// One part of a (possibly multipart) message.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Raw, still transfer-encoded body bytes.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a part from headers and a raw body.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Parses a part from a raw segment (headers, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if the header block is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_header_block(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(head))?;
        Ok(Self::new(headers, body.to_vec()))
    }

    /// Returns the content type, defaulting to `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the Content-Type header is malformed.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Returns the parsed Content-Disposition, if any.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers.get("content-disposition").map(ContentDisposition::parse)
    }

    /// Returns the transfer encoding, defaulting to 7bit.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Checks whether this part carries an attachment: either an explicit
    /// attachment disposition or any filename hint.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        if let Some(disposition) = self.disposition()
            && disposition.is_attachment()
        {
            return true;
        }
        self.filename().is_some()
    }

    /// Returns the attachment filename from the disposition, falling back to
    /// the legacy Content-Type name parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        if let Some(name) = self.disposition().and_then(|d| d.filename()) {
            return Some(name);
        }
        self.content_type().ok().and_then(|ct| ct.name())
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if Base64 or Quoted-Printable decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(&self.body)),
            TransferEncoding::QuotedPrintable => {
                decode_quoted_printable(&String::from_utf8_lossy(&self.body))
            }
            _ => Ok(self.body.clone()),
        }
    }

    /// Returns the decoded body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }
}

/// A parsed MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    /// Body bytes for single-part messages.
    pub body: Option<Vec<u8>>,
    /// Top-level parts for multipart messages.
    pub parts: Vec<Part>,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// Multipart bodies are split on the boundary delimiter into top-level
    /// parts; preamble and epilogue text around the delimiters is dropped.
    /// Nested multiparts stay raw inside their part and can be split again
    /// with [`split_multipart`] (the content walk does this).
    ///
    /// # Errors
    ///
    /// Returns an error if the headers are malformed or a multipart content
    /// type lacks its boundary parameter.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_header_block(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(head))?;

        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            let parts = split_multipart(body, boundary)?;
            return Ok(Self {
                headers,
                body: None,
                parts,
            });
        }

        Ok(Self {
            headers,
            body: Some(body.to_vec()),
            parts: Vec::new(),
        })
    }

    /// Returns the content type, defaulting to `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the Content-Type header is malformed.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Checks if this message was parsed as multipart.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty() || self.body.is_none()
    }

    /// Returns the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Returns the Sender header.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.headers.get("sender")
    }

    /// Returns the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Returns the Cc header.
    #[must_use]
    pub fn cc(&self) -> Option<&str> {
        self.headers.get("cc")
    }

    /// Returns the Bcc header.
    #[must_use]
    pub fn bcc(&self) -> Option<&str> {
        self.headers.get("bcc")
    }

    /// Returns the Subject header with RFC 2047 words decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.decoded("subject")
    }

    /// Returns the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Returns the In-Reply-To header.
    #[must_use]
    pub fn in_reply_to(&self) -> Option<&str> {
        self.headers.get("in-reply-to")
    }

    /// Parses the Date header as RFC 2822, normalized to UTC.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let raw = self.headers.get("date")?;
        DateTime::parse_from_rfc2822(raw.trim())
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }
}

/// Splits a raw message or part at the first blank line.
///
/// Returns the header block (including its final line ending) and the body.
/// Messages without a blank line are treated as all headers.
fn split_header_block(raw: &[u8]) -> (&[u8], &[u8]) {
    // A leading blank line means the header block is empty
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&[], rest);
    }

    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\n' {
            if raw.get(i + 1) == Some(&b'\n') {
                return (&raw[..=i], &raw[i + 2..]);
            }
            if raw.get(i + 1) == Some(&b'\r') && raw.get(i + 2) == Some(&b'\n') {
                return (&raw[..=i], &raw[i + 3..]);
            }
        }
        i += 1;
    }
    (raw, &[])
}

/// Splits a multipart body on its boundary delimiter into parsed parts.
///
/// Preamble (before the first delimiter) and epilogue (after the close
/// delimiter) are discarded. A missing close delimiter ends the final part
/// at the end of input.
///
/// # Errors
///
/// Returns an error if a part's header block is malformed.
pub fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut segments: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    for line in body.split(|&b| b == b'\n') {
        let marker = trim_line_end(line);

        if marker == close.as_bytes() {
            if let Some(segment) = current.take() {
                segments.push(segment);
            }
            break;
        }

        if marker == delimiter.as_bytes() {
            if let Some(segment) = current.take() {
                segments.push(segment);
            }
            current = Some(Vec::new());
            continue;
        }

        if let Some(segment) = &mut current {
            segment.extend_from_slice(line);
            segment.push(b'\n');
        }
    }

    if let Some(segment) = current.take() {
        segments.push(segment);
    }

    segments.into_iter().map(|s| Part::parse(&chomp(s))).collect()
}

/// Strips the trailing CR and transport padding from a boundary candidate.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b' ' | b'\t') {
        end -= 1;
    }
    &line[..end]
}

/// Removes the single line ending that belongs to the following delimiter.
fn chomp(mut segment: Vec<u8>) -> Vec<u8> {
    if segment.last() == Some(&b'\n') {
        segment.pop();
        if segment.last() == Some(&b'\r') {
            segment.pop();
        }
    }
    segment
}
