//! Metric identity naming rules
//!
//! Scope, node and cluster labels are pure functions of the raw names and
//! the configured prefixes: identical inputs always yield identical labels,
//! with no hidden state.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::collector::paths::decode_segment;

/// Fallback instance label when the overview carries no cluster name
pub const DEFAULT_CLUSTER_INSTANCE: &str = "cluster";

static LEADING_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new("^/").expect("invalid leading slash regex"));
static TRAILING_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new("/$").expect("invalid trailing slash regex"));
static INNER_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new("/").expect("invalid slash regex"));

/// Rewrite a decoded vhost name into a single label component
///
/// The empty name and `/` map to `default`. Otherwise slashes are rewritten
/// in a fixed order: the start anchor first, then the end anchor, then all
/// remaining occurrences.
pub fn normalize_vhost(name: &str) -> String {
    if name.is_empty() || name == "/" {
        return "default".to_string();
    }
    let name = LEADING_SLASH.replace(name, "slash_");
    let name = TRAILING_SLASH.replace(&name, "_slash");
    INNER_SLASH.replace_all(&name, "_slash_").into_owned()
}

/// Host segment of a raw node name (`rabbit@host1` yields `host1`)
///
/// A name without `@` is used as-is.
pub fn node_host(raw: &str) -> &str {
    raw.split('@').nth(1).unwrap_or(raw)
}

/// Builds scope and instance labels from the configured prefixes
#[derive(Debug, Clone)]
pub struct Namer {
    prefix: String,
    vhost_prefix: Option<String>,
}

impl Namer {
    /// Create a namer with the given namespace prefix and optional vhost
    /// prefix
    pub fn new(prefix: String, vhost_prefix: Option<String>) -> Self {
        Self {
            prefix,
            vhost_prefix,
        }
    }

    /// Scope label for a raw (URL-encoded) vhost name
    ///
    /// The name is percent-decoded before normalization, then joined with
    /// the namespace prefix and optional vhost prefix. `None` scopes the
    /// same way as the default vhost.
    pub fn vhost_scope(&self, raw: Option<&str>) -> String {
        let decoded = raw.map(decode_segment).unwrap_or_default();
        let core = normalize_vhost(&decoded);

        let mut label = String::new();
        if !self.prefix.is_empty() {
            label.push_str(&self.prefix);
            label.push('_');
        }
        if let Some(vhost_prefix) = &self.vhost_prefix {
            label.push_str(vhost_prefix);
            label.push('_');
        }
        label.push_str(&core);
        label
    }

    /// Instance label for the cluster overview
    ///
    /// `@` cannot appear in a label component, so it is rewritten; an absent
    /// or empty cluster name falls back to a fixed literal.
    pub fn cluster_instance(&self, cluster_name: Option<&str>) -> String {
        match cluster_name {
            Some(name) if !name.is_empty() => name.replace('@', "_at_"),
            _ => DEFAULT_CLUSTER_INSTANCE.to_string(),
        }
    }
}
