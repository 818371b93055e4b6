//! Service roles: named sets of access rules.

use crate::request::RequestContext;
use crate::rule::AccessRule;
use serde::{Deserialize, Serialize};

/// A set of permissions.
///
/// The role grants a request if ANY of its rules matches. A role with no
/// rules grants nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRole {
    pub rules: Vec<AccessRule>,
}

impl ServiceRole {
    /// Creates a role with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule (builder pattern).
    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns whether this role grants the request.
    pub fn matches(&self, req: &RequestContext) -> bool {
        self.matching_rule(req).is_some()
    }

    /// Returns the index of the first rule that grants the request.
    pub fn matching_rule(&self, req: &RequestContext) -> Option<usize> {
        self.rules.iter().position(|rule| rule.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestContext {
        RequestContext::new("reviews", "default")
            .with_path("/reviews/1")
            .with_method("GET")
    }

    #[test]
    fn test_empty_role_grants_nothing() {
        assert!(!ServiceRole::new().matches(&request()));
    }

    #[test]
    fn test_rules_are_or_combined() {
        let failing = AccessRule::for_services(["ratings"]);
        let passing = AccessRule::for_services(["reviews"]).with_method("GET");

        let role = ServiceRole::new().with_rule(failing.clone());
        assert!(!role.matches(&request()));

        let role = role.with_rule(passing);
        assert!(role.matches(&request()));
        assert_eq!(role.matching_rule(&request()), Some(1));

        let reversed = ServiceRole::new()
            .with_rule(AccessRule::for_services(["*"]))
            .with_rule(failing);
        assert_eq!(reversed.matching_rule(&request()), Some(0));
    }
}
