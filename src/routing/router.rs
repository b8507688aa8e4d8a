//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Find the longest matching prefix for a request path
//! - Produce the rewritten upstream path
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Equal-length prefixes: the first declared rule wins
//! - Explicit no-match rather than a silent default

use std::collections::HashSet;

use crate::config::RouteConfig;
use crate::routing::matcher::{PathPrefixMatcher, PathRewrite};

/// A compiled route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub name: String,
    pub matcher: PathPrefixMatcher,
    pub service: String,
    pub rewrite: PathRewrite,
}

impl From<RouteConfig> for RouteRule {
    fn from(config: RouteConfig) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(config.path_prefix),
            rewrite: PathRewrite::from(&config.rewrite),
            name: config.name,
            service: config.service,
        }
    }
}

/// The selected rule and the path to send upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    pub upstream_path: String,
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<RouteRule>,
}

impl Router {
    /// Compile routes, keeping their declaration order.
    pub fn from_config(routes: Vec<RouteConfig>) -> Self {
        let routes: Vec<RouteRule> = routes.into_iter().map(RouteRule::from).collect();

        let mut seen = HashSet::new();
        for rule in &routes {
            if !seen.insert(rule.matcher.as_str()) {
                tracing::warn!(
                    route = %rule.name,
                    prefix = %rule.matcher.as_str(),
                    "Duplicate route prefix, earlier declaration wins"
                );
            }
        }

        tracing::info!(routes = routes.len(), "Router compiled");
        Self { routes }
    }

    /// Longest-prefix match for `path` (no query string).
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        let mut best: Option<(&RouteRule, &str)> = None;

        for rule in &self.routes {
            let Some(rest) = rule.matcher.remainder(path) else {
                continue;
            };
            match best {
                Some((current, _)) if current.matcher.len() >= rule.matcher.len() => {}
                _ => best = Some((rule, rest)),
            }
        }

        best.map(|(rule, rest)| RouteMatch {
            rule,
            upstream_path: rule.rewrite.apply(rest),
        })
    }
}
