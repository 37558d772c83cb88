//! Path-prefix routing with longest-prefix matching.

use crate::config::RouteConfig;

#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted by descending prefix length so the first match wins.
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<RouteConfig>) -> Self {
        routes.sort_by_key(|r| std::cmp::Reverse(r.prefix.len()));
        Self { routes }
    }

    /// Resolve the upstream serving a request path.
    pub fn resolve(&self, path: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|route| {
            path.starts_with(&route.prefix)
                && (path.len() == route.prefix.len()
                    || path.as_bytes().get(route.prefix.len()) == Some(&b'/'))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteConfig> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            RouteConfig {
                name: "offering".into(),
                prefix: "/api/v1/offerings".into(),
                upstream: "http://offerings:8005".into(),
            },
            RouteConfig {
                name: "store".into(),
                prefix: "/api/v1/store".into(),
                upstream: "http://store:8006".into(),
            },
            RouteConfig {
                name: "store-offerings".into(),
                prefix: "/api/v1/store/offerings".into(),
                upstream: "http://store-read:8007".into(),
            },
        ])
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table();
        assert_eq!(
            table.resolve("/api/v1/store/offerings/abc").unwrap().name,
            "store-offerings"
        );
        assert_eq!(table.resolve("/api/v1/store/search").unwrap().name, "store");
    }

    #[test]
    fn prefix_matches_on_segment_boundary() {
        let table = table();
        // "/api/v1/offeringsX" must not match the offerings route.
        assert!(table.resolve("/api/v1/offeringsX").is_none());
        assert_eq!(
            table.resolve("/api/v1/offerings").unwrap().name,
            "offering"
        );
        assert_eq!(
            table.resolve("/api/v1/offerings/123/publish").unwrap().name,
            "offering"
        );
    }

    #[test]
    fn unknown_path_resolves_to_none() {
        assert!(table().resolve("/api/v2/other").is_none());
    }
}
