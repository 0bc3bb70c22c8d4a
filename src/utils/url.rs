//! URL utilities for consistent URL handling
//!
//! This module provides utilities for normalizing URLs to prevent issues
//! with trailing slashes when constructing API endpoints.

/// Normalize a base URL by removing trailing slashes
///
/// This ensures consistent URL construction when appending endpoints,
/// preventing double slashes in the final URLs.
///
/// # Examples
///
/// ```
/// use parley::utils::url::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta"),
///     "https://generativelanguage.googleapis.com/v1beta"
/// );
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta/"),
///     "https://generativelanguage.googleapis.com/v1beta"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// This function normalizes the base URL and safely appends the endpoint,
/// ensuring there are no double slashes in the result.
///
/// # Examples
///
/// ```
/// use parley::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://generativelanguage.googleapis.com/v1beta", "models"),
///     "https://generativelanguage.googleapis.com/v1beta/models"
/// );
/// assert_eq!(
///     construct_api_url(
///         "https://generativelanguage.googleapis.com/v1beta/",
///         "models/gemini-2.5-flash:streamGenerateContent"
///     ),
///     "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com/v1beta"),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com/v1beta/"),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com/v1beta///"),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("https://generativelanguage.googleapis.com/v1beta", "models"),
            "https://generativelanguage.googleapis.com/v1beta/models"
        );
        assert_eq!(
            construct_api_url("https://generativelanguage.googleapis.com/v1beta/", "models"),
            "https://generativelanguage.googleapis.com/v1beta/models"
        );
        assert_eq!(
            construct_api_url("https://generativelanguage.googleapis.com/v1beta", "/models"),
            "https://generativelanguage.googleapis.com/v1beta/models"
        );
        assert_eq!(
            construct_api_url(
                "https://generativelanguage.googleapis.com/v1beta///",
                "models/gemini-pro:streamGenerateContent"
            ),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:streamGenerateContent"
        );
    }
}
