//! Access decisions are made by the platform's attribute based policy layer, before the engine
//! is invoked. The engine only sees it through [Policy].

use serde::Deserialize;

use crate::catalog::User;
use crate::database::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CompleteVideo,
    StartVideo,
    ViewOffensive,
    ViewProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest<'a> {
    pub action: Action,
    /// The user whose progress or offensive is touched.
    pub subject: &'a Record<User>,
    /// The authenticated caller, when the request carries one.
    pub actor: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub trait Policy: std::fmt::Debug + Send + Sync {
    fn check(&self, request: &AccessRequest<'_>) -> Decision;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Policy for AllowAll {
    fn check(&self, _request: &AccessRequest<'_>) -> Decision {
        Decision::Allow
    }
}

/// Only lets callers act on their own progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerOnly;

impl Policy for OwnerOnly {
    fn check(&self, request: &AccessRequest<'_>) -> Decision {
        match request.actor {
            Some(actor) if actor == request.subject.key() => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}

/// Which built-in [Policy] to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    AllowAll,
    OwnerOnly,
}

impl PolicyKind {
    pub fn build(self) -> std::sync::Arc<dyn Policy> {
        match self {
            PolicyKind::AllowAll => std::sync::Arc::new(AllowAll),
            PolicyKind::OwnerOnly => std::sync::Arc::new(OwnerOnly),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(subject: &'a Record<User>, actor: Option<&'a str>) -> AccessRequest<'a> {
        AccessRequest {
            action: Action::CompleteVideo,
            subject,
            actor,
        }
    }

    #[test]
    fn owner_only_allows_the_owner() {
        let alice = Record::new("alice");
        assert_eq!(OwnerOnly.check(&request(&alice, Some("alice"))), Decision::Allow);
    }

    #[test]
    fn owner_only_denies_others_and_anonymous() {
        let alice = Record::new("alice");
        assert_eq!(OwnerOnly.check(&request(&alice, Some("bob"))), Decision::Deny);
        assert_eq!(OwnerOnly.check(&request(&alice, None)), Decision::Deny);
    }

    #[test]
    fn allow_all_allows_anonymous() {
        let alice = Record::new("alice");
        assert_eq!(AllowAll.check(&request(&alice, None)), Decision::Allow);
    }
}
