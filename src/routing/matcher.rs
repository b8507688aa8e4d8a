//! Path prefix matching and rewriting.
//!
//! # Design Decisions
//! - Prefixes match on segment boundaries: `/fleet` matches `/fleet` and
//!   `/fleet/7`, never `/fleetwood`
//! - Path matching is case-sensitive
//! - Trailing slashes on configured prefixes are ignored; `/` matches everything
//! - No regex, so matching stays O(prefix length)

use crate::config::RewriteConfig;

/// Matches the request path against a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    /// Normalized prefix without trailing slash; empty for the root prefix.
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Specificity used for longest-prefix selection.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    pub fn as_str(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }

    /// The part of `path` after the prefix, or `None` if it does not match.
    /// The remainder is empty or starts with `/`.
    pub fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.remainder(path).is_some()
    }
}

/// Compiled form of [`RewriteConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRewrite {
    Strip,
    Replace(String),
}

impl From<&RewriteConfig> for PathRewrite {
    fn from(config: &RewriteConfig) -> Self {
        match config {
            RewriteConfig::Strip => PathRewrite::Strip,
            RewriteConfig::Replace(target) => {
                PathRewrite::Replace(target.trim_end_matches('/').to_string())
            }
        }
    }
}

impl PathRewrite {
    /// Build the upstream path from the remainder left after the prefix.
    pub fn apply(&self, remainder: &str) -> String {
        let path = match self {
            PathRewrite::Strip => remainder.to_string(),
            PathRewrite::Replace(target) => format!("{target}{remainder}"),
        };
        if path.is_empty() {
            "/".to_string()
        } else {
            path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matches_on_segment_boundary() {
        let matcher = PathPrefixMatcher::new("/fleet");

        assert!(matcher.matches("/fleet"));
        assert!(matcher.matches("/fleet/"));
        assert!(matcher.matches("/fleet/vehicles/7"));
        assert!(!matcher.matches("/fleetwood"));
        assert!(!matcher.matches("/auth/fleet"));
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        let matcher = PathPrefixMatcher::new("/");
        assert!(matcher.is_root());
        assert_eq!(matcher.len(), 0);
        assert_eq!(matcher.remainder("/anything/here"), Some("/anything/here"));
        assert_eq!(matcher.as_str(), "/");
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let matcher = PathPrefixMatcher::new("/api/agencies/");
        assert_eq!(matcher.as_str(), "/api/agencies");
        assert_eq!(matcher.remainder("/api/agencies/42"), Some("/42"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let matcher = PathPrefixMatcher::new("/Fleet");
        assert!(!matcher.matches("/fleet"));
    }

    #[test]
    fn test_strip_rewrite() {
        let rewrite = PathRewrite::from(&RewriteConfig::Strip);
        assert_eq!(rewrite.apply("/42"), "/42");
        assert_eq!(rewrite.apply(""), "/");
    }

    #[test]
    fn test_replace_rewrite() {
        let rewrite = PathRewrite::from(&RewriteConfig::Replace("/v1/".into()));
        assert_eq!(rewrite.apply("/42"), "/v1/42");
        assert_eq!(rewrite.apply(""), "/v1");

        let root = PathRewrite::from(&RewriteConfig::Replace("/".into()));
        assert_eq!(root.apply("/42"), "/42");
        assert_eq!(root.apply(""), "/");
    }
}
