//! Membership verification
//!
//! [`MembershipOracle`] answers "is this user in the gated channel?" over an
//! unreliable, eventually consistent remote API, memoized by a
//! [`MembershipStore`].

/// Time-bounded memoization of verdicts.
pub mod cache;
/// Multi-strategy resolution with retry and fallback.
pub mod oracle;

pub use cache::{CacheEntry, MembershipCache, MembershipStore};
pub use oracle::{MembershipOracle, RetryPolicy, Verdict, VerdictSource};

/// Outcome of a membership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    /// Confirmed member
    Member,
    /// Confirmed non-member, or a fail-closed denial
    NotMember,
    /// Every strategy was inconclusive
    Unknown,
}

impl MembershipStatus {
    /// Build from a cached boolean verdict.
    #[must_use]
    pub const fn from_bool(is_member: bool) -> Self {
        if is_member {
            Self::Member
        } else {
            Self::NotMember
        }
    }

    /// Fail-closed view: `Unknown` becomes `NotMember`.
    #[must_use]
    pub const fn collapse(self) -> Self {
        match self {
            Self::Member => Self::Member,
            Self::NotMember | Self::Unknown => Self::NotMember,
        }
    }

    /// Whether access should be granted.
    #[must_use]
    pub const fn is_member(self) -> bool {
        matches!(self, Self::Member)
    }
}

#[cfg(test)]
mod tests {
    use super::MembershipStatus;

    #[test]
    fn test_unknown_collapses_to_denial() {
        assert_eq!(MembershipStatus::Unknown.collapse(), MembershipStatus::NotMember);
        assert_eq!(MembershipStatus::Member.collapse(), MembershipStatus::Member);
        assert!(!MembershipStatus::Unknown.is_member());
    }
}
