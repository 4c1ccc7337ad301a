//! SMTP reply parsing and classification.

use crate::error::{Error, Result};

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready.
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Closing transmission channel.
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested action completed.
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input.
    pub const START_DATA: Self = Self(354);

    /// Creates a reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// 2xx completion.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// 3xx intermediate.
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// 4xx transient failure.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// 5xx permanent failure.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code.
    pub code: ReplyCode,
    /// Text of each reply line, code and separator stripped.
    pub lines: Vec<String>,
}

impl Reply {
    /// Parses the collected lines of one reply.
    ///
    /// Multi-line replies separate continuation lines with `-` after the
    /// code (`250-…`) and finish with a space (`250 …`).
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is empty or a line is malformed.
    pub fn parse(raw_lines: &[String]) -> Result<Self> {
        let first = raw_lines
            .first()
            .ok_or_else(|| Error::Protocol("Empty reply".to_string()))?;

        let code_digits = first
            .get(0..3)
            .ok_or_else(|| Error::Protocol(format!("Reply too short: {first:?}")))?;
        let code = code_digits
            .parse::<u16>()
            .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_digits:?}")))?;

        let mut lines = Vec::with_capacity(raw_lines.len());
        for raw in raw_lines {
            match raw.len() {
                3 => lines.push(String::new()),
                n if n >= 4 => lines.push(raw[4..].to_string()),
                _ => return Err(Error::Protocol(format!("Malformed reply line: {raw:?}"))),
            }
        }

        Ok(Self {
            code: ReplyCode::new(code),
            lines,
        })
    }

    /// Checks whether a raw line terminates its reply.
    #[must_use]
    pub fn is_final_line(line: &str) -> bool {
        line.len() == 3 || (line.len() > 3 && line.as_bytes()[3] == b' ')
    }

    /// Returns true for 2xx replies.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Joins the reply text into one string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Converts a non-success reply into a server error.
    ///
    /// # Errors
    ///
    /// Returns the reply as `Error::Server` unless it is a 2xx completion.
    pub fn expect_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::server(self.code.as_u16(), self.text()))
        }
    }

    /// Requires an exact reply code.
    ///
    /// # Errors
    ///
    /// Returns the reply as `Error::Server` when the code differs.
    pub fn expect(self, code: ReplyCode) -> Result<Self> {
        if self.code == code {
            Ok(self)
        } else {
            Err(Error::server(self.code.as_u16(), self.text()))
        }
    }
}
