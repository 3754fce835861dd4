//! CORS policy, derived from `MOTION3D_CORS_ORIGINS`.

use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Wildcard unless the config names explicit origins.
pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let base = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    match state
        .config
        .cors_allowed_origins
        .as_deref()
        .map(parse_origins)
    {
        Some(origins) if !origins.is_empty() => base.allow_origin(origins),
        // Unset (or nothing parseable): wildcard, suitable for development.
        _ => base.allow_origin(Any),
    }
}

/// Split a comma-separated origin list, dropping empty entries and entries
/// that are not valid header values.
fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_trims_origin_list() {
        let origins = parse_origins(" https://a.example , https://b.example ");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://a.example");
        assert_eq!(origins[1], "https://b.example");
    }

    #[test]
    fn invalid_entries_are_dropped() {
        let origins = parse_origins("https://ok.example,\u{0}bad");
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0], "https://ok.example");
    }

    #[test]
    fn empty_list_parses_to_nothing() {
        assert!(parse_origins("").is_empty());
        assert!(parse_origins(" , ").is_empty());
    }
}
