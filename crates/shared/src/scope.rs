// crates/shared/src/scope.rs

use crate::rule_name::RuleName;

/// The tenant ownership prefix used to select rules during reconciliation.
/// A scope is either a whole account (delete events at account granularity)
/// or one (account, vpc) pair. The rule-name prefix is the only isolation
/// key between tenants; no cross-tenant locking exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    account: String,
    vpc: Option<String>,
}

impl Scope {
    pub fn account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            vpc: None,
        }
    }

    pub fn vpc(account: impl Into<String>, vpc: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            vpc: Some(vpc.into()),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account
    }

    pub fn vpc_id(&self) -> Option<&str> {
        self.vpc.as_deref()
    }

    /// Whether a live rule belongs to this scope.
    pub fn matches(&self, name: &RuleName) -> bool {
        if name.account() != self.account {
            return false;
        }
        match &self.vpc {
            Some(vpc) => name.vpc() == vpc,
            None => true,
        }
    }

    /// Prefix of the IP-set variable names owned by this scope:
    /// `a<account>` for account scopes, `a<account><vpc>` for VPC scopes.
    pub fn ip_set_prefix(&self) -> String {
        match &self.vpc {
            Some(vpc) => format!("a{}{}", self.account, vpc),
            None => format!("a{}", self.account),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vpc_scope_matches_only_its_vpc() {
        let scope = Scope::vpc("111122223333", "aaa111");
        assert!(scope.matches(&RuleName::derive("111122223333", "aaa111", "x")));
        assert!(!scope.matches(&RuleName::derive("111122223333", "bbb222", "x")));
        assert!(!scope.matches(&RuleName::derive("444455556666", "aaa111", "x")));
    }

    #[test]
    fn account_scope_matches_every_vpc_of_the_account() {
        let scope = Scope::account("111122223333");
        assert!(scope.matches(&RuleName::derive("111122223333", "aaa111", "x")));
        assert!(scope.matches(&RuleName::derive("111122223333", "bbb222", "x")));
        assert!(!scope.matches(&RuleName::derive("444455556666", "aaa111", "x")));
    }

    #[test]
    fn ip_set_prefix_tracks_granularity() {
        assert_eq!(Scope::account("111").ip_set_prefix(), "a111");
        assert_eq!(Scope::vpc("111", "abc").ip_set_prefix(), "a111abc");
    }
}
