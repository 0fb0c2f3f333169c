use rand::{Rng, seq::IndexedRandom};
use reqwest::Method;

const METHODS: [(&str, u8); 4] = [("GET", 6), ("POST", 2), ("PUT", 1), ("DELETE", 1)];
const PATHS: [(&str, u8); 11] = [
    ("/", 10),
    ("/about", 5),
    ("/api/users", 40),
    ("/api/slow", 5),
    ("/api/fail", 3),
    ("/auth/login", 5),
    ("/assets/app.js", 15),
    ("/static/logo.svg", 3),
    ("/docs/guide.pdf", 2),
    ("/favicon.ico", 5),
    ("/api/_analytics/logs", 2),
];
const USER_AGENTS: [(&str, u8); 3] = [
    ("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0", 6),
    ("curl/8.5.0", 3),
    ("traffic-maker/0.1", 1),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    pub method: Method,
    pub path: &'static str,
    pub user_agent: &'static str,
}

/// Picks a weighted path; only `/api/users` gets a non-GET verb.
pub fn generate_request<R: Rng + ?Sized>(rng: &mut R) -> PlannedRequest {
    let path = PATHS.choose_weighted(rng, |(_, w)| *w).map_or("/", |p| p.0);
    let method = if path == "/api/users" {
        METHODS.choose_weighted(rng, |(_, w)| *w).map_or("GET", |m| m.0)
    } else {
        "GET"
    };
    let user_agent = USER_AGENTS
        .choose_weighted(rng, |(_, w)| *w)
        .map_or("traffic-maker/0.1", |ua| ua.0);
    PlannedRequest {
        method: Method::from_bytes(method.as_bytes()).unwrap_or(Method::GET),
        path,
        user_agent,
    }
}
