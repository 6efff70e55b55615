//! Route access policy.
//!
//! # Responsibility
//! - Decide whether a role may reach a route before any ledger or register
//!   operation runs.
//!
//! # Invariants
//! - The rule table is immutable after construction and passed explicitly.
//! - Among matching rules the most specific wins; ties go to the rule
//!   declared first.
//! - Unmatched routes are public unless they fall under the protected
//!   prefix, which requires some role.

use crate::error::CoreError;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use thiserror::Error;

const REGEX_META: &[char] = &[
    '.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '^', '$', '\\',
];
const ANONYMOUS_ROLE: &str = "anonymous";

/// One configured route pattern and the roles it admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    /// Literal path or regex, matched against the whole route.
    pub route_pattern: String,
    pub allowed_roles: BTreeSet<String>,
}

impl AccessRule {
    pub fn new<I, S>(route_pattern: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            route_pattern: route_pattern.into(),
            allowed_roles: roles
                .into_iter()
                .filter_map(|role| normalize_role(role.as_ref()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessPolicyError {
    #[error("route pattern `{pattern}` is invalid: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("protected prefix `{0}` must start with `/`")]
    InvalidProtectedPrefix(String),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: AccessRule,
    matcher: Regex,
    specificity: usize,
}

/// Immutable (route, role) evaluator.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<CompiledRule>,
    protected_prefix: Option<String>,
}

impl AccessPolicy {
    pub fn new(
        rules: Vec<AccessRule>,
        protected_prefix: Option<String>,
    ) -> Result<Self, AccessPolicyError> {
        if let Some(prefix) = protected_prefix.as_deref() {
            if !prefix.starts_with('/') {
                return Err(AccessPolicyError::InvalidProtectedPrefix(prefix.to_string()));
            }
        }

        let rules = rules
            .into_iter()
            .map(|rule| {
                let matcher = Regex::new(&format!("^(?:{})$", rule.route_pattern)).map_err(
                    |err| AccessPolicyError::InvalidPattern {
                        pattern: rule.route_pattern.clone(),
                        message: err.to_string(),
                    },
                )?;
                Ok(CompiledRule {
                    specificity: literal_prefix_len(&rule.route_pattern),
                    matcher,
                    rule,
                })
            })
            .collect::<Result<Vec<_>, AccessPolicyError>>()?;

        Ok(Self {
            rules,
            protected_prefix,
        })
    }

    /// Route map of the academy dashboard.
    ///
    /// Role areas are private to their role; shared list screens and the
    /// ledger/register endpoints are granted per role. Unlisted `/api`
    /// routes are admin-only and unlisted `/list` screens need a signed-in
    /// role.
    pub fn academy_default() -> Self {
        let rules = vec![
            AccessRule::new("/admin(.*)", ["admin"]),
            AccessRule::new("/student(.*)", ["student"]),
            AccessRule::new("/teacher(.*)", ["teacher"]),
            AccessRule::new("/parent(.*)", ["parent"]),
            AccessRule::new("/list/teachers(/.*)?", ["admin", "teacher"]),
            AccessRule::new("/list/students(/.*)?", ["admin", "teacher"]),
            AccessRule::new("/list/parents(/.*)?", ["admin", "teacher"]),
            AccessRule::new("/list/coaches(/.*)?", ["admin"]),
            AccessRule::new("/list/staff(/.*)?", ["admin"]),
            AccessRule::new("/list/teams(/.*)?", ["admin", "teacher"]),
            AccessRule::new(
                "/list/sessions(/.*)?",
                ["admin", "teacher", "student", "parent"],
            ),
            AccessRule::new(
                "/list/events(/.*)?",
                ["admin", "teacher", "student", "parent"],
            ),
            AccessRule::new(
                "/list/announcements(/.*)?",
                ["admin", "teacher", "student", "parent"],
            ),
            AccessRule::new("/list/orders(/.*)?", ["admin", "parent"]),
            AccessRule::new("/list/fees(/.*)?", ["admin", "parent"]),
            AccessRule::new(
                "/list/attendance(/.*)?",
                ["admin", "teacher", "student", "parent"],
            ),
            AccessRule::new("/api(.*)", ["admin"]),
            AccessRule::new("/api/roster(.*)", ["admin"]),
            AccessRule::new("/api/plans(.*)", ["admin"]),
            AccessRule::new("/api/fees(.*)", ["admin"]),
            AccessRule::new("/api/fees/year", ["admin", "parent"]),
            AccessRule::new("/api/attendance(.*)", ["admin", "teacher"]),
            AccessRule::new(
                "/api/attendance/status",
                ["admin", "teacher", "student", "parent"],
            ),
        ];
        match Self::new(rules, Some("/list".to_string())) {
            Ok(policy) => policy,
            // The table above is a compile-time constant made of valid patterns.
            Err(err) => unreachable!("built-in access map is invalid: {err}"),
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &AccessRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    pub fn protected_prefix(&self) -> Option<&str> {
        self.protected_prefix.as_deref()
    }

    /// Returns whether `role` may reach `route_path`.
    ///
    /// An empty or whitespace role counts as no role.
    pub fn is_allowed(&self, route_path: &str, role: Option<&str>) -> bool {
        let route = normalize_route(route_path);
        let role = role.and_then(normalize_role);

        match self.best_match(route) {
            Some(compiled) => role
                .as_ref()
                .is_some_and(|role| compiled.rule.allowed_roles.contains(role)),
            None if self.is_protected(route) => role.is_some(),
            None => true,
        }
    }

    /// Like `is_allowed`, but yields `CoreError::Unauthorized` on denial.
    pub fn require(&self, route_path: &str, role: Option<&str>) -> Result<(), CoreError> {
        if self.is_allowed(route_path, role) {
            return Ok(());
        }
        let route = normalize_route(route_path);
        let role = role
            .and_then(normalize_role)
            .unwrap_or_else(|| ANONYMOUS_ROLE.to_string());
        debug!("event=access_denied module=access status=denied route={route} role={role}");
        Err(CoreError::Unauthorized {
            route: route.to_string(),
            role,
        })
    }

    fn best_match(&self, route: &str) -> Option<&CompiledRule> {
        let mut best: Option<&CompiledRule> = None;
        for compiled in self.rules.iter().filter(|c| c.matcher.is_match(route)) {
            // Strictly greater: on ties the earlier declaration stays.
            if best.map_or(true, |current| compiled.specificity > current.specificity) {
                best = Some(compiled);
            }
        }
        best
    }

    fn is_protected(&self, route: &str) -> bool {
        let Some(prefix) = self.protected_prefix.as_deref() else {
            return false;
        };
        if prefix == "/" {
            return true;
        }
        let prefix = prefix.trim_end_matches('/');
        route == prefix
            || route
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Drops query, fragment and trailing slashes; the root stays `/`.
fn normalize_route(route_path: &str) -> &str {
    let trimmed = route_path.trim();
    let end = trimmed.find(&['?', '#'][..]).unwrap_or(trimmed.len());
    let path = &trimmed[..end];
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/",
        stripped => stripped,
    }
}

fn normalize_role(role: &str) -> Option<String> {
    let trimmed = role.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

fn literal_prefix_len(pattern: &str) -> usize {
    pattern
        .find(|ch: char| REGEX_META.contains(&ch))
        .unwrap_or(pattern.len())
}

#[cfg(test)]
mod tests {
    use super::{literal_prefix_len, normalize_route, AccessPolicy, AccessPolicyError, AccessRule};

    #[test]
    fn specificity_counts_literal_prefix() {
        assert_eq!(literal_prefix_len("/list/parents"), 13);
        assert_eq!(literal_prefix_len("/list/parents(.*)"), 13);
        assert_eq!(literal_prefix_len("/admin(.*)"), 6);
        assert_eq!(literal_prefix_len("(.*)"), 0);
    }

    #[test]
    fn route_drops_query_and_fragment() {
        assert_eq!(normalize_route(" /list/fees?page=2 "), "/list/fees");
        assert_eq!(normalize_route("/list/fees#top"), "/list/fees");
        assert_eq!(normalize_route("/list/fees/?page=2"), "/list/fees");
        assert_eq!(normalize_route("/list/fees//"), "/list/fees");
        assert_eq!(normalize_route("/"), "/");
        assert_eq!(normalize_route("//"), "/");
        assert_eq!(normalize_route(""), "");
    }

    #[test]
    fn more_specific_rule_wins_regardless_of_order() {
        let policy = AccessPolicy::new(
            vec![
                AccessRule::new("/api(.*)", ["admin"]),
                AccessRule::new("/api/public(.*)", ["guest"]),
            ],
            None,
        )
        .unwrap();
        assert!(policy.is_allowed("/api/public/feed", Some("guest")));
        assert!(!policy.is_allowed("/api/public/feed", Some("admin")));
        assert!(policy.is_allowed("/api/private", Some("admin")));
    }

    #[test]
    fn equally_specific_rules_resolve_to_first_declared() {
        let policy = AccessPolicy::new(
            vec![
                AccessRule::new("/list/parents", ["admin"]),
                AccessRule::new("/list/parents(.*)", ["teacher"]),
            ],
            None,
        )
        .unwrap();
        assert!(policy.is_allowed("/list/parents", Some("admin")));
        assert!(!policy.is_allowed("/list/parents", Some("teacher")));
        assert!(policy.is_allowed("/list/parents/7", Some("teacher")));
    }

    #[test]
    fn invalid_patterns_and_prefixes_are_rejected() {
        let err = AccessPolicy::new(vec![AccessRule::new("/list/(", ["admin"])], None)
            .expect_err("unbalanced group must fail");
        assert!(matches!(err, AccessPolicyError::InvalidPattern { .. }));

        let err = AccessPolicy::new(Vec::new(), Some("list".to_string()))
            .expect_err("relative prefix must fail");
        assert_eq!(
            err,
            AccessPolicyError::InvalidProtectedPrefix("list".to_string())
        );
    }
}
