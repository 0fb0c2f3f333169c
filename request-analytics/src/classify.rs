use std::sync::LazyLock;

use regex::Regex;

use crate::{invariants::ExcludedPrefix, models::Category};

/// Namespace of the analytics endpoints themselves.
pub const ANALYTICS_PREFIX: &str = "/api/_analytics/";

pub const DEFAULT_EXCLUDED_PREFIXES: [&str; 5] =
    ["/favicon.ico", "/_nuxt", "/__nuxt", "/static", "/_vercel"];

static ASSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:js|css|png|jpg|gif|svg|ico|woff2?|ttf|eot)$").expect("valid asset pattern")
});

/// Maps a request path to its category. First matching rule wins.
pub fn classify(path: &str) -> Category {
    if path.starts_with("/api/") {
        Category::Api
    } else if path.starts_with("/auth/") {
        Category::Auth
    } else if ASSET_PATTERN.is_match(path) {
        Category::Asset
    } else if path.starts_with("/static/") {
        Category::Static
    } else if path == "/" || !path.contains('.') {
        Category::Page
    } else {
        Category::Other
    }
}

pub fn is_analytics_path(path: &str) -> bool {
    path.starts_with(ANALYTICS_PREFIX)
}

/// Prefix denylist shared by the middleware and the query endpoint.
///
/// The analytics namespace always passes this filter; the middleware drops it
/// separately so dashboard polling never reaches the buffer.
#[derive(Debug, Clone)]
pub struct Filter {
    excluded: Vec<ExcludedPrefix>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_PREFIXES.iter().filter_map(|p| p.parse().ok()))
    }
}

impl Filter {
    pub fn new(excluded: impl IntoIterator<Item = ExcludedPrefix>) -> Self {
        Self {
            excluded: excluded.into_iter().collect(),
        }
    }

    pub fn should_log(&self, path: &str) -> bool {
        if is_analytics_path(path) {
            return true;
        }
        !self.excluded.iter().any(|prefix| prefix.matches(path))
    }
}
