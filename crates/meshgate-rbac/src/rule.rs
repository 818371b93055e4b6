//! Access rules: one permission clause of a [`ServiceRole`](crate::role::ServiceRole).
//!
//! A rule matches a request when every populated field matches:
//!
//! ```text
//! services  AND paths  AND NOT not_paths
//!           AND methods AND NOT not_methods   (HTTP only)
//!           AND ports   AND NOT not_ports
//!           AND every constraint
//! ```
//!
//! Within one field, entries are OR-combined. Empty optional lists match
//! every request.

use crate::pattern::matches_any;
use crate::request::RequestContext;
use serde::{Deserialize, Serialize};

/// An extra condition on request attributes.
///
/// Satisfied iff the request provides a value for `key` and that value
/// matches any entry of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Attribute key, e.g. `destination.labels[version]`.
    pub key: String,

    /// Accepted value patterns.
    pub values: Vec<String>,
}

impl Constraint {
    /// Creates a new constraint.
    pub fn new<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns whether the request satisfies this constraint.
    pub fn is_satisfied_by(&self, req: &RequestContext) -> bool {
        req.constraint_value(&self.key)
            .is_some_and(|value| matches_any(&self.values, &value))
    }
}

/// One permission clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRule {
    /// Service name patterns. Must be non-empty.
    pub services: Vec<String>,

    /// Path patterns. Empty matches every path.
    pub paths: Vec<String>,

    /// Path patterns excluded from this rule.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_paths: Vec<String>,

    /// HTTP method patterns. Empty matches every method.
    pub methods: Vec<String>,

    /// HTTP method patterns excluded from this rule.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_methods: Vec<String>,

    /// Destination ports. Empty matches every port.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    /// Destination ports excluded from this rule.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_ports: Vec<u16>,

    /// Extra conditions, all of which must hold.
    pub constraints: Vec<Constraint>,
}

impl AccessRule {
    /// Creates a rule for the given service patterns with no other restrictions.
    pub fn for_services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: services.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, pattern: impl Into<String>) -> Self {
        self.paths.push(pattern.into());
        self
    }

    pub fn without_path(mut self, pattern: impl Into<String>) -> Self {
        self.not_paths.push(pattern.into());
        self
    }

    pub fn with_method(mut self, pattern: impl Into<String>) -> Self {
        self.methods.push(pattern.into());
        self
    }

    pub fn without_method(mut self, pattern: impl Into<String>) -> Self {
        self.not_methods.push(pattern.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.ports.push(port);
        self
    }

    pub fn without_port(mut self, port: u16) -> Self {
        self.not_ports.push(port);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Returns whether this rule grants the request.
    pub fn matches(&self, req: &RequestContext) -> bool {
        // Services first: cheapest rejection for rules aimed elsewhere.
        if !matches_any(&self.services, &req.service) {
            return false;
        }

        if !self.paths.is_empty() && !matches_any(&self.paths, &req.path) {
            return false;
        }
        if matches_any(&self.not_paths, &req.path) {
            return false;
        }

        if req.checks_method() {
            if !self.methods.is_empty() && !matches_any(&self.methods, &req.method) {
                return false;
            }
            if matches_any(&self.not_methods, &req.method) {
                return false;
            }
        }

        if !self.ports.is_empty() && !req.port.is_some_and(|p| self.ports.contains(&p)) {
            return false;
        }
        if req.port.is_some_and(|p| self.not_ports.contains(&p)) {
            return false;
        }

        self.constraints.iter().all(|c| c.is_satisfied_by(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(service: &str, path: &str) -> RequestContext {
        RequestContext::new(service, "default")
            .with_path(path)
            .with_method("GET")
    }

    #[test]
    fn test_service_prefix_and_method() {
        let rule = AccessRule::for_services(["a*"]).with_method("GET");

        assert!(rule.matches(&get("abc", "/x")));
        assert!(!rule.matches(&get("abc", "/x").with_method("POST")));
        assert!(!rule.matches(&get("xyz", "/x")));
    }

    #[test]
    fn test_empty_paths_and_methods_are_wildcards() {
        let rule = AccessRule::for_services(["*"]);

        assert!(rule.matches(&get("svc", "/anything")));
        assert!(rule.matches(&get("svc", "").with_method("DELETE")));
    }

    #[test]
    fn test_empty_services_never_match() {
        let rule = AccessRule::default();
        assert!(!rule.matches(&get("svc", "/")));
    }

    #[test]
    fn test_path_patterns() {
        let rule = AccessRule::for_services(["svc"])
            .with_path("/books/*")
            .with_path("*/reviews");

        assert!(rule.matches(&get("svc", "/books/1")));
        assert!(rule.matches(&get("svc", "/ratings/reviews")));
        assert!(!rule.matches(&get("svc", "/authors/1")));
    }

    #[test]
    fn test_not_paths_exclude() {
        let rule = AccessRule::for_services(["svc"])
            .with_path("/books/*")
            .without_path("/books/admin*");

        assert!(rule.matches(&get("svc", "/books/1")));
        assert!(!rule.matches(&get("svc", "/books/admin/purge")));
    }

    #[test]
    fn test_grpc_ignores_methods() {
        let rule = AccessRule::for_services(["svc"])
            .with_method("GET")
            .without_method("POST");

        let grpc = RequestContext::new("svc", "default")
            .with_path("/pkg.Service/Call")
            .with_method("POST")
            .grpc();

        assert!(rule.matches(&grpc));
    }

    #[test]
    fn test_not_methods_exclude() {
        let rule = AccessRule::for_services(["svc"]).without_method("DELETE");

        assert!(rule.matches(&get("svc", "/")));
        assert!(!rule.matches(&get("svc", "/").with_method("DELETE")));
    }

    #[test]
    fn test_ports() {
        let rule = AccessRule::for_services(["svc"])
            .with_port(8080)
            .with_port(9090);

        assert!(rule.matches(&get("svc", "/").with_port(8080)));
        assert!(!rule.matches(&get("svc", "/").with_port(80)));
        assert!(!rule.matches(&get("svc", "/")), "portless request fails a port list");

        let rule = AccessRule::for_services(["svc"]).without_port(15000);
        assert!(rule.matches(&get("svc", "/")));
        assert!(!rule.matches(&get("svc", "/").with_port(15000)));
    }

    #[test]
    fn test_constraints_are_and_combined() {
        let rule = AccessRule::for_services(["svc"])
            .with_constraint(Constraint::new("destination.labels[version]", ["v1", "v2"]))
            .with_constraint(Constraint::new("destination.labels[app]", ["reviews"]));

        let both = get("svc", "/")
            .with_label("version", "v2")
            .with_label("app", "reviews");
        assert!(rule.matches(&both));

        let missing_app = get("svc", "/").with_label("version", "v2");
        assert!(!rule.matches(&missing_app));

        let wrong_version = get("svc", "/")
            .with_label("version", "v3")
            .with_label("app", "reviews");
        assert!(!rule.matches(&wrong_version));
    }

    #[test]
    fn test_constraint_values_support_patterns() {
        let c = Constraint::new("request.headers[x-env]", ["prod-*"]);

        assert!(c.is_satisfied_by(&get("svc", "/").with_header("X-Env", "prod-eu")));
        assert!(!c.is_satisfied_by(&get("svc", "/").with_header("X-Env", "staging")));
        assert!(!c.is_satisfied_by(&get("svc", "/")));
    }
}
