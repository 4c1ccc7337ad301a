//! Transfer and header codecs.
//!
//! Base64 and Quoted-Printable transfer decoding (RFC 2045) plus RFC 2047
//! encoded-word handling for header values.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// Whitespace (including the line breaks mandated by RFC 2045 body wrapping)
/// is stripped before decoding.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Maximum encoded line length for Quoted-Printable output.
const QP_LINE_LIMIT: usize = 76;

/// Encodes text using Quoted-Printable encoding (RFC 2045).
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut out = String::new();
    let mut column = 0;

    for byte in text.as_bytes() {
        if column >= QP_LINE_LIMIT - 3 {
            out.push_str("=\r\n");
            column = 0;
        }

        match byte {
            // Printable ASCII, minus '='
            b'!'..=b'<' | b'>'..=b'~' => {
                out.push(*byte as char);
                column += 1;
            }
            b' ' => {
                // Spaces must not land at the end of an encoded line
                if column >= QP_LINE_LIMIT - 1 {
                    out.push_str("=20");
                    column += 3;
                } else {
                    out.push(' ');
                    column += 1;
                }
            }
            _ => {
                out.push('=');
                let _ = write!(out, "{byte:02X}");
                column += 3;
            }
        }
    }

    out
}

/// Decodes Quoted-Printable text (RFC 2045) into raw bytes.
///
/// Soft line breaks (`=` followed by a line ending) are removed.
///
/// # Errors
///
/// Returns an error if the input contains a malformed escape sequence.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break: "=\r\n" or "=\n"
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Non-ASCII escape sequence".to_string()))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex escape: {e}")))?;
        out.push(byte);
        i += 3;
    }

    Ok(out)
}

/// Encodes a header value as an RFC 2047 encoded word if needed.
///
/// Pure ASCII values without the reserved `=?` characters pass through
/// unchanged; everything else becomes a single B-encoded word,
/// `=?charset?B?…?=`.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

/// Decodes all RFC 2047 encoded words in a header value.
///
/// Whitespace between two adjacent encoded words is dropped, per RFC 2047
/// section 6.2; whitespace next to plain tokens is preserved as a single
/// space. Tokens that look like encoded words but fail to decode pass
/// through verbatim rather than failing the whole value.
#[must_use]
pub fn decode_rfc2047(value: &str) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }

    let mut out = String::new();
    let mut prev_encoded = false;
    let mut first = true;

    for token in value.split_ascii_whitespace() {
        match decode_encoded_word(token) {
            Some(decoded) => {
                if !first && !prev_encoded {
                    out.push(' ');
                }
                out.push_str(&decoded);
                prev_encoded = true;
            }
            None => {
                if !first {
                    out.push(' ');
                }
                out.push_str(token);
                prev_encoded = false;
            }
        }
        first = false;
    }

    out
}

/// Decodes a single `=?charset?encoding?text?=` token.
///
/// The charset is assumed to be UTF-8 compatible; bytes that are not valid
/// UTF-8 decode lossily. Returns `None` for anything that is not a
/// well-formed encoded word.
fn decode_encoded_word(token: &str) -> Option<String> {
    let inner = token.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut fields = inner.split('?');
    let _charset = fields.next()?;
    let encoding = fields.next()?;
    let text = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    match encoding {
        "B" | "b" => {
            let bytes = decode_base64(text).ok()?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        "Q" | "q" => {
            // Q encoding writes spaces as underscores
            let unescaped = text.replace('_', " ");
            let bytes = decode_quoted_printable(&unescaped).ok()?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => None,
    }
}
