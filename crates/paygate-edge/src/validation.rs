use crate::error::GatewayError;

/// Sanitize a query string to prevent CRLF injection and fragment smuggling.
pub fn sanitize_query(query: &str) -> Result<String, GatewayError> {
    // Reject CRLF injection
    if query.contains('\r') || query.contains('\n') {
        return Err(GatewayError::InvalidPath(
            "query string must not contain newlines".to_string(),
        ));
    }

    // Fragments are never sent to the server
    let sanitized = match query.find('#') {
        Some(idx) => &query[..idx],
        None => query,
    };

    if sanitized.contains('\0') {
        return Err(GatewayError::InvalidPath(
            "query string must not contain null bytes".to_string(),
        ));
    }

    Ok(sanitized.to_string())
}

/// Split the still-encoded proxy tail into path segments.
///
/// Empty segments are dropped, so the joined path can never start with `//`.
/// Each segment is validated in decoded form but returned encoded, so `%3F`
/// stays `%3F` instead of turning into a query separator.
pub fn proxy_segments(raw_tail: &str) -> Result<Vec<String>, GatewayError> {
    raw_tail
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize_segment)
        .collect()
}

fn sanitize_segment(segment: &str) -> Result<String, GatewayError> {
    let decoded = urlencoding::decode(segment)
        .map_err(|_| GatewayError::InvalidPath("invalid URL encoding in path".to_string()))?;

    if decoded == "." || decoded == ".." || decoded.contains("../") || decoded.contains("/..") {
        return Err(GatewayError::InvalidPath(
            "path traversal not allowed".to_string(),
        ));
    }

    if decoded.contains('\r') || decoded.contains('\n') {
        return Err(GatewayError::InvalidPath(
            "path must not contain newlines".to_string(),
        ));
    }

    if decoded.contains('\0') {
        return Err(GatewayError::InvalidPath(
            "path must not contain null bytes".to_string(),
        ));
    }

    Ok(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_split_and_keep_encoding() {
        assert_eq!(
            proxy_segments("/transactions/42").unwrap(),
            vec!["transactions", "42"]
        );
        assert_eq!(
            proxy_segments("//accounts//a%3Fb/").unwrap(),
            vec!["accounts", "a%3Fb"]
        );
        assert!(proxy_segments("").unwrap().is_empty());
    }

    #[test]
    fn test_segments_reject_traversal() {
        assert!(proxy_segments("transactions/../admin").is_err());
        assert!(proxy_segments("transactions/%2e%2e/admin").is_err());
        assert!(proxy_segments("a/%2e%2e%2fadmin").is_err());
        assert!(proxy_segments("./x").is_err());
    }

    #[test]
    fn test_segments_reject_control_chars() {
        assert!(proxy_segments("a%0d%0aHost:%20evil").is_err());
        assert!(proxy_segments("a%00b").is_err());
    }

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("page=2&limit=10").unwrap(), "page=2&limit=10");
        assert_eq!(sanitize_query("page=2#frag").unwrap(), "page=2");
        assert!(sanitize_query("a=1\r\nb=2").is_err());
        assert!(sanitize_query("a=\0").is_err());
    }
}
