//! Joining configured base URLs with endpoint paths.

/// Strips trailing slashes so endpoint paths can be appended safely.
///
/// ```
/// use cardchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:3000/"), "http://localhost:3000");
/// assert_eq!(normalize_base_url("https://api.openai.com/v1//"), "https://api.openai.com/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Joins `base_url` and `endpoint` with exactly one slash.
///
/// ```
/// use cardchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.openai.com/v1/", "/chat/completions"),
///     "https://api.openai.com/v1/chat/completions"
/// );
/// assert_eq!(
///     construct_api_url("http://localhost:3000", "api/card-action"),
///     "http://localhost:3000/api/card-action"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

/// Whether `url` looks usable as an HTTP endpoint root.
pub fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            normalize_base_url("  https://api.openai.com/v1/ "),
            "https://api.openai.com/v1"
        );
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        for (base, endpoint) in [
            ("http://localhost:3000", "api/card-action"),
            ("http://localhost:3000/", "api/card-action"),
            ("http://localhost:3000", "/api/card-action"),
            ("http://localhost:3000///", "//api/card-action"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "http://localhost:3000/api/card-action"
            );
        }
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://localhost:3000"));
        assert!(is_http_url("https://cards.example.com"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("localhost:3000"));
        assert!(!is_http_url("ftp://example.com"));
    }
}
