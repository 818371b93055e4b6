//! Request descriptors handed to the decision engine.
//!
//! A [`RequestContext`] carries everything the engine needs to evaluate one
//! request: the destination (service, namespace, path, method, port, labels)
//! and the already-authenticated [`Caller`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Application protocol of the intercepted request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP; the method is checked against `AccessRule::methods`.
    #[default]
    Http,

    /// gRPC; the method is always `POST` on the wire, so method lists are
    /// treated as satisfied.
    Grpc,
}

/// Identity of the calling workload or user.
///
/// `user` is assumed to be authenticated by the proxy before the request
/// reaches the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Caller {
    pub user: Option<String>,
    pub group: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl Caller {
    /// Creates an anonymous caller with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the authenticated user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the caller's group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Adds a caller property (e.g. `source.namespace`).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Attributes of a single request, as seen by the enforcement proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    /// Fully-qualified destination service name.
    pub service: String,

    /// Namespace of the destination service.
    pub namespace: String,

    pub path: String,

    /// HTTP method. Ignored for gRPC requests.
    pub method: String,

    pub protocol: Protocol,

    /// Destination port, if known.
    pub port: Option<u16>,

    /// Labels of the destination workload, addressed by
    /// `destination.labels[<name>]` constraints.
    pub destination_labels: BTreeMap<String, String>,

    /// Request headers. Names are lowercased on deserialization and compared
    /// case-insensitively by `request.headers[..]` constraints.
    #[serde(deserialize_with = "lowercase_keys")]
    pub headers: BTreeMap<String, String>,

    /// Additional constraint attributes keyed by their full constraint key.
    pub attributes: BTreeMap<String, String>,

    pub caller: Caller,
}

impl RequestContext {
    /// Creates an HTTP request to `service` in `namespace`.
    pub fn new(service: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Marks the request as gRPC.
    pub fn grpc(mut self) -> Self {
        self.protocol = Protocol::Grpc;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.destination_labels.insert(key.into(), value.into());
        self
    }

    /// Adds a request header. The name is stored lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    /// Resolves a constraint key to the request value it refers to.
    ///
    /// Returns `None` when the request carries no value for `key`; a
    /// constraint on such a key is unsatisfied.
    pub fn constraint_value(&self, key: &str) -> Option<String> {
        if let Some(label) = bracketed(key, "destination.labels") {
            return self.destination_labels.get(label).cloned();
        }

        if let Some(header) = bracketed(key, "request.headers") {
            return self
                .headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(header))
                .map(|(_, value)| value.clone());
        }

        match key {
            "destination.name" if !self.service.is_empty() => Some(self.service.clone()),
            "destination.namespace" if !self.namespace.is_empty() => Some(self.namespace.clone()),
            "destination.port" => self.port.map(|p| p.to_string()),
            _ => self.attributes.get(key).cloned(),
        }
    }

    /// Returns whether method lists apply to this request.
    pub(crate) fn checks_method(&self) -> bool {
        self.protocol == Protocol::Http
    }
}

fn lowercase_keys<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect())
}

/// Extracts `name` from keys of the form `<prefix>[name]`.
fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
}
