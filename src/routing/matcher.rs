//! Route matching logic.
//!
//! # Responsibilities
//! - Match host header (exact or leading-wildcard, case-insensitive)
//! - Match path prefix (case-sensitive)
//! - Combine conditions with AND semantics
//! - Report how specific a match was so the router can rank candidates
//!
//! # Design Decisions
//! - Rules are compiled once into tagged variants; nothing is parsed per request
//! - Host matching is case-insensitive (per HTTP spec), port is ignored
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use std::cmp::Ordering;

/// A compiled host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    /// `example.com`
    Exact(String),
    /// `*.example.com`, stored as the suffix `.example.com`.
    Wildcard(String),
}

impl HostPattern {
    /// Parse a pattern. Returns `None` for empty or malformed patterns.
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
        if let Some(suffix) = pattern.strip_prefix("*.") {
            if !is_hostname(suffix) {
                return None;
            }
            return Some(HostPattern::Wildcard(format!(".{suffix}")));
        }
        is_hostname(&pattern).then_some(HostPattern::Exact(pattern))
    }

    /// Match against an already normalized host.
    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Exact(expected) => host == expected,
            HostPattern::Wildcard(suffix) => {
                host.len() > suffix.len() && host.ends_with(suffix.as_str())
            }
        }
    }

    fn rank(&self) -> HostRank {
        match self {
            HostPattern::Exact(host) => HostRank::Exact(host.len()),
            HostPattern::Wildcard(suffix) => HostRank::Wildcard(suffix.len()),
        }
    }
}

impl std::fmt::Display for HostPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostPattern::Exact(host) => f.write_str(host),
            HostPattern::Wildcard(suffix) => write!(f, "*{suffix}"),
        }
    }
}

fn is_hostname(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

/// Normalize a Host header value: lowercase, no port, no trailing dot.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let without_port = if let Some(rest) = raw.strip_prefix('[') {
        // IPv6 literal: keep the address, drop brackets and port.
        rest.split(']').next().unwrap_or(rest)
    } else {
        match raw.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => raw,
        }
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}

/// How well the host condition matched. Declaration order of variants is
/// significant: later variants outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum HostRank {
    /// The rule has no host condition.
    #[default]
    Any,
    /// Matched a wildcard; longer suffixes are more specific.
    Wildcard(usize),
    /// Matched exactly.
    Exact(usize),
}

/// Specificity of a successful match. Compared lexicographically: the longest
/// matched path prefix first, then host specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Specificity {
    pub prefix_len: usize,
    pub host: HostRank,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix_len
            .cmp(&other.prefix_len)
            .then_with(|| self.host.cmp(&other.host))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Specificity {
    fn merge(self, other: Specificity) -> Specificity {
        Specificity {
            prefix_len: self.prefix_len.max(other.prefix_len),
            host: self.host.max(other.host),
        }
    }
}

/// A compiled match condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Any of the patterns matches the host.
    Host(Vec<HostPattern>),
    /// Any of the prefixes matches the path.
    PathPrefix(Vec<String>),
    /// Every sub-rule matches.
    All(Vec<Rule>),
}

impl Rule {
    /// Compile host patterns and path prefixes into a rule.
    ///
    /// Returns `None` if a host pattern is malformed.
    pub fn compile(hosts: &[String], path_prefixes: &[String]) -> Option<Rule> {
        let mut parts = Vec::new();
        if !hosts.is_empty() {
            let patterns = hosts
                .iter()
                .map(|h| HostPattern::parse(h))
                .collect::<Option<Vec<_>>>()?;
            parts.push(Rule::Host(patterns));
        }
        if !path_prefixes.is_empty() {
            parts.push(Rule::PathPrefix(path_prefixes.to_vec()));
        }
        Some(match parts.len() {
            1 => parts.remove(0),
            _ => Rule::All(parts),
        })
    }

    /// Evaluate against a normalized host and a request path.
    ///
    /// Returns the specificity of the match, or `None` if it does not match.
    pub fn evaluate(&self, host: &str, path: &str) -> Option<Specificity> {
        match self {
            Rule::Host(patterns) => patterns
                .iter()
                .filter(|p| p.matches(host))
                .map(HostPattern::rank)
                .max()
                .map(|host| Specificity { prefix_len: 0, host }),
            Rule::PathPrefix(prefixes) => prefixes
                .iter()
                .filter(|p| path.starts_with(p.as_str()))
                .map(String::len)
                .max()
                .map(|prefix_len| Specificity {
                    prefix_len,
                    host: HostRank::Any,
                }),
            Rule::All(rules) => rules.iter().try_fold(Specificity::default(), |acc, rule| {
                rule.evaluate(host, path).map(|s| acc.merge(s))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matcher() {
        let rule = Rule::compile(&["example.com".into()], &[]).unwrap();

        assert!(rule.evaluate("example.com", "/").is_some());
        assert!(rule.evaluate(&normalize_host("EXAMPLE.COM:8080"), "/").is_some());
        assert!(rule.evaluate("other.com", "/").is_none());
    }

    #[test]
    fn test_wildcard_host() {
        let pattern = HostPattern::parse("*.Example.com").unwrap();
        assert_eq!(pattern.to_string(), "*.example.com");
        assert!(pattern.matches("api.example.com"));
        assert!(pattern.matches("a.b.example.com"));
        assert!(!pattern.matches("example.com"));
        assert!(!pattern.matches("badexample.com"));
    }

    #[test]
    fn test_invalid_host_patterns() {
        assert!(HostPattern::parse("").is_none());
        assert!(HostPattern::parse("*").is_none());
        assert!(HostPattern::parse("*.").is_none());
        assert!(HostPattern::parse("exa mple.com").is_none());
        assert!(HostPattern::parse("a..b").is_none());
    }

    #[test]
    fn test_path_matcher() {
        let rule = Rule::compile(&[], &["/api".into(), "/api/v2".into()]).unwrap();

        assert_eq!(rule.evaluate("any", "/api/v2/users").unwrap().prefix_len, 7);
        assert_eq!(rule.evaluate("any", "/api/v1").unwrap().prefix_len, 4);
        assert!(rule.evaluate("any", "/images").is_none());
        assert!(rule.evaluate("any", "/API").is_none());
    }

    #[test]
    fn test_composite_requires_both() {
        let rule = Rule::compile(&["example.com".into()], &["/api".into()]).unwrap();
        assert!(matches!(rule, Rule::All(_)));

        let spec = rule.evaluate("example.com", "/api/x").unwrap();
        assert_eq!(spec.prefix_len, 4);
        assert_eq!(spec.host, HostRank::Exact(11));
        assert!(rule.evaluate("example.com", "/web").is_none());
        assert!(rule.evaluate("other.com", "/api").is_none());
    }

    #[test]
    fn test_specificity_ordering() {
        let path_only = Specificity {
            prefix_len: 4,
            host: HostRank::Any,
        };
        let host_only = Specificity {
            prefix_len: 0,
            host: HostRank::Exact(11),
        };
        let wildcard = Specificity {
            prefix_len: 0,
            host: HostRank::Wildcard(12),
        };
        assert!(path_only > host_only);
        assert!(host_only > wildcard);
        assert!(wildcard > Specificity::default());
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM"), "example.com");
        assert_eq!(normalize_host("example.com:443"), "example.com");
        assert_eq!(normalize_host("example.com."), "example.com");
        assert_eq!(normalize_host("[::1]:8080"), "::1");
    }
}
