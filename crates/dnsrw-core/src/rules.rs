//! Domain rewrite rules
//!
//! Rules map domains to addresses. At tunnel start (and on explicit
//! reload) the active rules are partitioned into an immutable
//! [`RuleSnapshot`] with separate exact and wildcard maps; the engine
//! swaps whole snapshots, never edits one.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{info, warn};

/// A single rewrite rule
///
/// The source of truth for rules lives outside the core; the engine only
/// ever sees the subset with `enabled` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Domain, possibly carrying a leading `*.` wildcard marker
    pub domain: String,
    /// Address the domain should resolve to
    pub address: String,
    /// Disabled rules are kept by the store but ignored here
    pub enabled: bool,
}

impl Rule {
    /// Create an enabled rule
    pub fn new(domain: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            address: address.into(),
            enabled: true,
        }
    }
}

/// Immutable domain-to-address mapping derived from the active rules
///
/// `exact` is keyed by complete lower-cased domains; `wildcard` by the
/// suffix behind a `*.` marker. A snapshot is never mutated after
/// construction — reloads build a new one and swap the reference.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    exact: HashMap<String, Ipv4Addr>,
    wildcard: HashMap<String, Ipv4Addr>,
}

impl RuleSnapshot {
    /// Partition rules into a snapshot
    ///
    /// Disabled rules are skipped; rules whose address is not a valid IPv4
    /// address are skipped with a warning (IPv6 rewriting is out of scope).
    pub fn build(rules: &[Rule]) -> Self {
        let mut exact = HashMap::new();
        let mut wildcard = HashMap::new();

        for rule in rules.iter().filter(|rule| rule.enabled) {
            let address: Ipv4Addr = match rule.address.parse() {
                Ok(address) => address,
                Err(_) => {
                    warn!(
                        domain = %rule.domain,
                        address = %rule.address,
                        "Skipping rule without a valid IPv4 address"
                    );
                    continue;
                }
            };

            let domain = rule.domain.trim().to_lowercase();
            if let Some(suffix) = domain.strip_prefix("*.") {
                wildcard.insert(suffix.to_string(), address);
            } else if !domain.is_empty() {
                exact.insert(domain, address);
            }
        }

        Self { exact, wildcard }
    }

    /// Resolve a domain against the snapshot
    ///
    /// At every suffix level the exact map is consulted before the
    /// wildcard map, then the leftmost label is stripped and the walk
    /// retries, so an exact rule beats a wildcard at the same depth and
    /// a wildcard for `example.com` covers `a.b.example.com` as well as
    /// `example.com` itself.
    pub fn resolve(&self, domain: &str) -> Option<Ipv4Addr> {
        let domain = domain.to_lowercase();
        let mut current = domain.as_str();

        loop {
            if let Some(address) = self.exact.get(current) {
                return Some(*address);
            }
            if let Some(address) = self.wildcard.get(current) {
                return Some(*address);
            }

            match current.find('.') {
                Some(dot) => current = &current[dot + 1..],
                None => return None,
            }
        }
    }

    /// Total number of mappings in the snapshot
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    /// Check if the snapshot holds no mappings
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcard.is_empty()
    }

    /// Number of exact mappings
    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    /// Number of wildcard mappings
    pub fn wildcard_len(&self) -> usize {
        self.wildcard.len()
    }
}

/// Parse rules from the persisted line format
///
/// Each non-blank, non-`#` line is `<address> <domain>` separated by runs
/// of whitespace; extra fields are ignored. Lines whose address is not a
/// valid IPv4 address are skipped with a warning.
pub fn parse_rules(content: &str) -> Vec<Rule> {
    let mut rules = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(address), Some(domain)) = (parts.next(), parts.next()) else {
            warn!(line, "Skipping malformed rule line");
            continue;
        };

        if address.parse::<Ipv4Addr>().is_err() {
            warn!(line, "Skipping rule line with invalid address");
            continue;
        }

        rules.push(Rule::new(domain, address));
    }

    rules
}

/// External collaborator delivering the active rule set
///
/// Loads are one-shot and synchronous: the engine calls this once at start
/// and once per explicit reload, never as a live subscription.
pub trait RuleSource: Send + Sync {
    /// Return the currently active rules
    fn active_rules(&self) -> Result<Vec<Rule>>;
}

/// Rule source backed by a rules file
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    /// Create a source reading from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleSource for FileRuleSource {
    fn active_rules(&self) -> Result<Vec<Rule>> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::RuleSource(format!("{}: {e}", self.path.display())))?;
        let rules = parse_rules(&content);
        info!(count = rules.len(), path = %self.path.display(), "Loaded rules");
        Ok(rules)
    }
}

/// Fixed in-memory rule source
pub struct StaticRuleSource {
    rules: Vec<Rule>,
}

impl StaticRuleSource {
    /// Create a source that always returns `rules`
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl RuleSource for StaticRuleSource {
    fn active_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.clone())
    }
}
