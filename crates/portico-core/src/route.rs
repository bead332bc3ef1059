//! Prefix routing table
//!
//! Routes are matched first-match in declaration order using a plain
//! `starts_with` test. Overlapping prefixes are not reordered by specificity:
//! with `/api` declared before `/api/users`, every `/api/users/..` request
//! goes to `/api`.

use crate::{CoreError, Result};
use serde_json::Value;
use url::Url;

/// One configured route
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    /// Path prefix, always starting with '/'
    pub prefix: String,
    /// Backend base URL
    pub target: Url,
}

impl RouteEntry {
    /// Create a validated route entry
    pub fn new(prefix: impl Into<String>, target: &str) -> Result<Self> {
        let prefix = prefix.into();
        if !prefix.starts_with('/') {
            return Err(CoreError::InvalidPrefix(prefix));
        }

        let target = Url::parse(target).map_err(|e| CoreError::InvalidTarget {
            prefix: prefix.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(target.scheme(), "http" | "https") || target.cannot_be_a_base() {
            return Err(CoreError::InvalidTarget {
                prefix,
                reason: format!("unsupported scheme '{}'", target.scheme()),
            });
        }

        Ok(Self { prefix, target })
    }

    /// Base URL without a trailing slash, ready for path concatenation
    pub fn base(&self) -> &str {
        self.target.as_str().trim_end_matches('/')
    }
}

/// Outcome of a successful route lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    /// The matching entry
    pub entry: &'a RouteEntry,
    /// Request path with the prefix removed, query string re-appended
    pub rewritten_path: String,
}

impl ResolvedRoute<'_> {
    /// Full upstream URL for this request
    ///
    /// A remainder without a leading '/' (prefix matched mid-segment) still
    /// lands under the base path instead of being glued onto the authority.
    pub fn upstream_url(&self) -> String {
        let separator = if self.rewritten_path.starts_with('/') { "" } else { "/" };
        format!("{}{}{}", self.entry.base(), separator, self.rewritten_path)
    }
}

/// Immutable, ordered prefix table
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table from entries in precedence order
    pub fn new(routes: Vec<RouteEntry>) -> Result<Self> {
        for (i, route) in routes.iter().enumerate() {
            if routes[..i].iter().any(|r| r.prefix == route.prefix) {
                return Err(CoreError::DuplicatePrefix(route.prefix.clone()));
            }
        }
        Ok(Self { routes })
    }

    /// Parse a JSON object of `prefix -> URL`, keeping key order
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build from an already parsed JSON object
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or(CoreError::NotAnObject)?;

        let routes = map
            .iter()
            .map(|(prefix, target)| {
                let target = target
                    .as_str()
                    .ok_or_else(|| CoreError::NonStringTarget(prefix.clone()))?;
                RouteEntry::new(prefix.as_str(), target)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(routes)
    }

    /// Resolve a request path (optionally carrying `?query`) to a backend
    pub fn resolve(&self, path_and_query: &str) -> Option<ResolvedRoute<'_>> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let entry = self.routes.iter().find(|r| path.starts_with(&r.prefix))?;

        let remainder = &path[entry.prefix.len()..];
        let mut rewritten_path = if remainder.is_empty() {
            "/".to_string()
        } else {
            remainder.to_string()
        };

        if let Some(query) = query {
            rewritten_path.push('?');
            rewritten_path.push_str(query);
        }

        Some(ResolvedRoute {
            entry,
            rewritten_path,
        })
    }

    /// Configured prefixes in declaration order
    pub fn prefixes(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.prefix.clone()).collect()
    }

    /// All entries in declaration order
    pub fn entries(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if no routes are configured
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table() -> RouteTable {
        RouteTable::from_json(
            r#"{
                "/api/users": "http://localhost:5001",
                "/api/orders": "http://localhost:5002",
                "/api/products": "http://localhost:5003/v2/"
            }"#,
        )
        .unwrap()
    }

    #[rstest]
    #[case("/api/users/123", "/123", "http://localhost:5001/123")]
    #[case("/api/orders", "/", "http://localhost:5002/")]
    #[case("/api/orders/9?expand=items&x=1", "/9?expand=items&x=1", "http://localhost:5002/9?expand=items&x=1")]
    #[case("/api/users?page=2", "/?page=2", "http://localhost:5001/?page=2")]
    #[case("/api/products/7", "/7", "http://localhost:5003/v2/7")]
    fn test_resolve(#[case] path: &str, #[case] rewritten: &str, #[case] upstream: &str) {
        let table = table();
        let resolved = table.resolve(path).unwrap();
        assert_eq!(resolved.rewritten_path, rewritten);
        assert_eq!(resolved.upstream_url(), upstream);
    }

    #[test]
    fn test_no_match() {
        let table = table();
        assert!(table.resolve("/api/unknown").is_none());
        assert!(table.resolve("/").is_none());
        // query strings never participate in matching
        assert!(table.resolve("/other?to=/api/users").is_none());
    }

    #[test]
    fn test_plain_prefix_match_is_not_segment_aware() {
        let table = table();
        let resolved = table.resolve("/api/users-admin").unwrap();
        assert_eq!(resolved.entry.prefix, "/api/users");
        assert_eq!(resolved.rewritten_path, "-admin");
        assert_eq!(resolved.upstream_url(), "http://localhost:5001/-admin");

        let resolved = table.resolve("/api/products-legacy?id=3").unwrap();
        assert_eq!(resolved.rewritten_path, "-legacy?id=3");
        assert_eq!(resolved.upstream_url(), "http://localhost:5003/v2/-legacy?id=3");
    }

    #[test]
    fn test_first_declared_wins() {
        let table = RouteTable::from_json(
            r#"{"/api": "http://general:1", "/api/users": "http://users:2"}"#,
        )
        .unwrap();
        let resolved = table.resolve("/api/users/1").unwrap();
        assert_eq!(resolved.entry.prefix, "/api");
        assert_eq!(resolved.rewritten_path, "/users/1");

        let table = RouteTable::from_json(
            r#"{"/api/users": "http://users:2", "/api": "http://general:1"}"#,
        )
        .unwrap();
        let resolved = table.resolve("/api/users/1").unwrap();
        assert_eq!(resolved.entry.prefix, "/api/users");
    }

    #[test]
    fn test_prefixes_keep_declaration_order() {
        let table = RouteTable::from_json(
            r#"{"/z": "http://z:1", "/a": "http://a:1", "/m": "http://m:1"}"#,
        )
        .unwrap();
        assert_eq!(table.prefixes(), vec!["/z", "/a", "/m"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            RouteTable::from_json("[]"),
            Err(CoreError::NotAnObject)
        ));
        assert!(matches!(
            RouteTable::from_json(r#"{"/a": 5}"#),
            Err(CoreError::NonStringTarget(_))
        ));
        assert!(matches!(
            RouteTable::from_json(r#"{"a": "http://x:1"}"#),
            Err(CoreError::InvalidPrefix(_))
        ));
        assert!(matches!(
            RouteTable::from_json(r#"{"/a": "not a url"}"#),
            Err(CoreError::InvalidTarget { .. })
        ));
        assert!(matches!(
            RouteTable::from_json(r#"{"/a": "ftp://x/"}"#),
            Err(CoreError::InvalidTarget { .. })
        ));
        assert!(matches!(
            RouteTable::from_json("{not json"),
            Err(CoreError::Deserialization(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_rewrite_strips_prefix(suffix in "(/[a-z0-9]{1,8}){0,4}", query in proptest::option::of("[a-z]=[0-9]{1,3}")) {
            let table = table();
            let mut path = format!("/api/orders{suffix}");
            if let Some(q) = &query {
                path.push('?');
                path.push_str(q);
            }

            let resolved = table.resolve(&path).unwrap();
            let expected_path = if suffix.is_empty() { "/".to_string() } else { suffix.clone() };
            let expected = match &query {
                Some(q) => format!("{expected_path}?{q}"),
                None => expected_path,
            };
            proptest::prop_assert_eq!(resolved.rewritten_path, expected);
            proptest::prop_assert_eq!(resolved.entry.prefix.as_str(), "/api/orders");
        }
    }

    #[test]
    fn test_duplicate_prefix() {
        let routes = vec![
            RouteEntry::new("/a", "http://x:1").unwrap(),
            RouteEntry::new("/a", "http://y:1").unwrap(),
        ];
        assert!(matches!(
            RouteTable::new(routes),
            Err(CoreError::DuplicatePrefix(_))
        ));
    }
}
