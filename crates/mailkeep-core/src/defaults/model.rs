//! Mailbox defaults model types.

use serde::{Deserialize, Serialize};

use crate::mailbox::MailboxId;

/// Identifier of a company in the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub i64);

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The configuration singleton: which mailbox plays which role.
///
/// One row per company, plus an optional global row (`company = None`) that
/// serves as the fallback for companies without their own assignments. All
/// four roles are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxDefaults {
    /// Company these assignments apply to; `None` is the global fallback.
    pub company: Option<CompanyId>,
    /// Mailbox receiving successfully dispatched mail.
    pub sent: MailboxId,
    /// Mailbox holding unfinished drafts.
    pub draft: MailboxId,
    /// Mailbox receiving mail that failed to dispatch.
    pub error: MailboxId,
    /// Mailbox queueing mail for dispatch.
    pub outbox: MailboxId,
}

impl MailboxDefaults {
    /// Creates global assignments (no company scope).
    #[must_use]
    pub const fn global(
        sent: MailboxId,
        draft: MailboxId,
        error: MailboxId,
        outbox: MailboxId,
    ) -> Self {
        Self {
            company: None,
            sent,
            draft,
            error,
            outbox,
        }
    }

    /// Scopes the assignments to a company.
    #[must_use]
    pub const fn for_company(mut self, company: CompanyId) -> Self {
        self.company = Some(company);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_then_scoped() {
        let defaults = MailboxDefaults::global(
            MailboxId::new(1),
            MailboxId::new(2),
            MailboxId::new(3),
            MailboxId::new(4),
        );
        assert!(defaults.company.is_none());
        assert_eq!(defaults.outbox, MailboxId::new(4));

        let scoped = defaults.for_company(CompanyId(7));
        assert_eq!(scoped.company, Some(CompanyId(7)));
        assert_eq!(scoped.sent, MailboxId::new(1));
    }
}
