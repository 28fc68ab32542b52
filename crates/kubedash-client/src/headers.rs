//! Reads authentication and impersonation headers off an inbound request

use http::HeaderMap;
use http::header::AUTHORIZATION;

use kubedash_types::CredentialContext;

pub const IMPERSONATE_USER: &str = "impersonate-user";
pub const IMPERSONATE_GROUP: &str = "impersonate-group";
/// Prefix of `Impersonate-Extra-<key>` headers. `http` lower-cases names.
pub const IMPERSONATE_EXTRA_PREFIX: &str = "impersonate-extra-";

const BEARER_PREFIX: &str = "Bearer ";

/// Build a credential context from a header set
pub fn extract_credentials(headers: &HeaderMap) -> CredentialContext {
    CredentialContext {
        bearer_token: extract_bearer_token(headers).map(str::to_string),
        impersonate_user: extract_impersonate_user(headers).map(str::to_string),
        impersonate_groups: extract_impersonate_groups(headers),
        impersonate_extra: extract_impersonate_extra(headers).into_iter().collect(),
    }
}

/// Token from `Authorization: Bearer <token>`. Other schemes, an empty token
/// and non-ASCII values all count as no token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
}

pub fn extract_impersonate_user(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IMPERSONATE_USER)
        .and_then(|v| v.to_str().ok())
        .filter(|user| !user.is_empty())
}

/// All `Impersonate-Group` values in declaration order
pub fn extract_impersonate_groups(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(IMPERSONATE_GROUP)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `Impersonate-Extra-<key>` values grouped by lower-cased key
pub fn extract_impersonate_extra(headers: &HeaderMap) -> Vec<(String, Vec<String>)> {
    headers
        .keys()
        .filter_map(|name| {
            let key = name.as_str().strip_prefix(IMPERSONATE_EXTRA_PREFIX)?;
            if key.is_empty() {
                return None;
            }
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string)
                .collect();
            if values.is_empty() {
                return None;
            }
            Some((key.to_string(), values))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        // prefix match is case-sensitive
        headers.insert("Authorization", "bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_keeps_inner_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer  padded".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some(" padded"));

        headers.insert("Authorization", "Bearer ".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_non_ascii() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_groups_preserve_order() {
        let mut headers = HeaderMap::new();
        headers.append("Impersonate-Group", "group1".parse().unwrap());
        headers.append("Impersonate-Group", "groups2".parse().unwrap());
        headers.append("Impersonate-Group", "group0".parse().unwrap());

        assert_eq!(
            extract_impersonate_groups(&headers),
            vec!["group1", "groups2", "group0"]
        );
    }

    #[test]
    fn test_extra_merges_case_insensitive_keys() {
        let mut headers = HeaderMap::new();
        headers.append("Impersonate-Extra-Scope", "views".parse().unwrap());
        headers.append("impersonate-extra-scope", "writes".parse().unwrap());
        headers.append("IMPERSONATE-EXTRA-service", "iguess".parse().unwrap());

        let ctx = extract_credentials(&headers);
        assert_eq!(ctx.impersonate_extra.len(), 2);
        assert_eq!(ctx.impersonate_extra["scope"], vec!["views", "writes"]);
        assert_eq!(ctx.impersonate_extra["service"], vec!["iguess"]);
    }

    #[test]
    fn test_extra_with_only_non_ascii_values_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer t".parse().unwrap());
        headers.append(
            "impersonate-extra-scope",
            HeaderValue::from_bytes(b"\xffx").unwrap(),
        );
        headers.append("impersonate-extra-service", "iguess".parse().unwrap());
        headers.append(
            "impersonate-extra-service",
            HeaderValue::from_bytes(b"\xffy").unwrap(),
        );

        let ctx = extract_credentials(&headers);
        assert!(!ctx.impersonate_extra.contains_key("scope"));
        assert_eq!(ctx.impersonate_extra["service"], vec!["iguess"]);

        headers.remove("impersonate-extra-service");
        let ctx = extract_credentials(&headers);
        assert!(ctx.impersonate_extra.is_empty());
        assert!(!ctx.requests_impersonation());
    }

    #[test]
    fn test_extract_credentials_empty() {
        let ctx = extract_credentials(&HeaderMap::new());
        assert_eq!(ctx, CredentialContext::default());
        assert!(!ctx.requests_impersonation());
    }

    #[test]
    fn test_extract_credentials_full() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer test-token".parse().unwrap());
        headers.insert("Impersonate-User", "impersonatedUser".parse().unwrap());
        headers.append("Impersonate-Group", "group1".parse().unwrap());

        let ctx = extract_credentials(&headers);
        assert_eq!(ctx.bearer_token.as_deref(), Some("test-token"));
        assert_eq!(ctx.impersonate_user.as_deref(), Some("impersonatedUser"));
        assert_eq!(ctx.impersonate_groups, vec!["group1"]);
        assert!(ctx.impersonate_extra.is_empty());
    }
}
