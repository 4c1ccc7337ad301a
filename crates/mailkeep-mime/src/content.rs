//! Body and attachment extraction.
//!
//! Walks a parsed message's part tree and pulls out the plain-text body, the
//! HTML body, and every attachment, recursing through nested multiparts.

use crate::error::{Error, Result};
use crate::message::{Message, Part, split_multipart};

/// An extracted attachment.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attachment {
    /// Filename from the disposition or name parameter, if given.
    pub filename: Option<String>,
    /// Content type essence, e.g. `application/pdf`.
    pub content_type: String,
    /// Decoded attachment bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Size of the decoded payload in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// The displayable content of a message.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MailContent {
    /// First non-attachment `text/plain` part.
    pub text: Option<String>,
    /// First non-attachment `text/html` part.
    pub html: Option<String>,
    /// Every attachment found in the part tree.
    pub attachments: Vec<Attachment>,
}

impl MailContent {
    /// Checks whether any displayable body was found.
    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.text.is_some() || self.html.is_some()
    }
}

/// Extracts bodies and attachments from a parsed message.
///
/// # Errors
///
/// Returns an error if a part's content type is malformed, a nested
/// multipart lacks its boundary, or a body fails to decode.
pub fn extract_content(message: &Message) -> Result<MailContent> {
    let mut content = MailContent::default();

    if message.parts.is_empty() {
        let root = Part::new(
            message.headers.clone(),
            message.body.clone().unwrap_or_default(),
        );
        walk_part(&root, &mut content)?;
    } else {
        for part in &message.parts {
            walk_part(part, &mut content)?;
        }
    }

    Ok(content)
}

fn walk_part(part: &Part, out: &mut MailContent) -> Result<()> {
    let content_type = part.content_type()?;

    if content_type.is_multipart() {
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        for nested in split_multipart(&part.body, boundary)? {
            walk_part(&nested, out)?;
        }
        return Ok(());
    }

    if part.is_attachment() {
        out.attachments.push(Attachment {
            filename: part.filename(),
            content_type: content_type.essence(),
            data: part.decode_body()?,
        });
        return Ok(());
    }

    if content_type.matches("text", "plain") {
        if out.text.is_none() {
            out.text = Some(part.body_text()?);
        }
    } else if content_type.matches("text", "html") {
        if out.html.is_none() {
            out.html = Some(part.body_text()?);
        }
    } else {
        // Non-text part without a disposition still counts as an attachment
        out.attachments.push(Attachment {
            filename: None,
            content_type: content_type.essence(),
            data: part.decode_body()?,
        });
    }

    Ok(())
}
