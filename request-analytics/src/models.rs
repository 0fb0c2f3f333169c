use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse grouping of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Api,
    Asset,
    Page,
    Auth,
    Static,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Asset => "asset",
            Self::Page => "page",
            Self::Auth => "auth",
            Self::Static => "static",
            Self::Other => "other",
        }
    }

    /// Single glyph shown in front of console lines.
    pub fn icon(self) -> char {
        match self {
            Self::Api => '⌁',
            Self::Asset => '◈',
            Self::Page => '□',
            Self::Auth => '⚿',
            Self::Static => '▤',
            Self::Other => '◌',
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed request as kept in the ring buffer and served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    pub category: Category,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_time: f64,
    pub size: String,
    pub memory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u64>,
}

/// Everything the middleware observed about one completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub at: chrono::DateTime<chrono::Utc>,
    pub method: String,
    pub path: String,
    pub endpoint: String,
    pub status: u16,
    pub elapsed_ms: f64,
    pub content_length: Option<u64>,
    pub user_agent: Option<String>,
    pub remote_addr: Option<String>,
}

impl Exchange {
    /// First whitespace-delimited token of the user agent.
    pub fn user_agent_product(&self) -> Option<String> {
        self.user_agent
            .as_deref()
            .and_then(|ua| ua.split_whitespace().next())
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn exchange(user_agent: Option<&str>) -> Exchange {
        Exchange {
            at: Utc::now(),
            method: "GET".into(),
            path: "/".into(),
            endpoint: "/".into(),
            status: 200,
            elapsed_ms: 1.0,
            content_length: None,
            user_agent: user_agent.map(Into::into),
            remote_addr: None,
        }
    }

    #[test]
    fn user_agent_product_takes_first_token() {
        let ex = exchange(Some("Mozilla/5.0 (X11; Linux x86_64)"));
        assert_eq!(ex.user_agent_product().as_deref(), Some("Mozilla/5.0"));
        assert_eq!(exchange(None).user_agent_product(), None);
        assert_eq!(exchange(Some("   ")).user_agent_product(), None);
    }

    #[test]
    fn log_entry_serializes_with_dashboard_field_names() {
        let entry = LogEntry {
            timestamp: "12:00:01".into(),
            category: Category::Api,
            method: "GET".into(),
            url: "/api/users".into(),
            status: 200,
            response_time: 12.5,
            size: "1.2KB".into(),
            memory: "-".into(),
            user_agent: None,
            requests_per_minute: Some(3),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["category"], "api");
        assert_eq!(json["responseTime"], 12.5);
        assert_eq!(json["requestsPerMinute"], 3);
        assert!(json.get("userAgent").is_none());
    }
}
