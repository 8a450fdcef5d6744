//! URL construction helpers for upstream API endpoints.

/// Strip trailing slashes from a base URL so endpoint joins never produce
/// double slashes.
pub fn normalize_base_url(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Join a base URL and an endpoint path.
///
/// ```
/// use dramatis::utils::url::join_url;
///
/// assert_eq!(
///     join_url("https://openrouter.ai/api/v1/", "/chat/completions"),
///     "https://openrouter.ai/api/v1/chat/completions"
/// );
/// ```
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}
