//! HTTP client initialization.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::config::HTTP_TIMEOUT;
use crate::error_handling::InitializationError;

/// Initializes the HTTP client used for Airtable requests.
///
/// Every request carries `Authorization: Bearer <api_key>`.
///
/// # Errors
///
/// Returns `InitializationError::ApiKeyError` if the key is empty or not a
/// valid header value, and `HttpClientError` if the client cannot be built.
pub fn init_client(api_key: &str) -> Result<reqwest::Client, InitializationError> {
    if api_key.trim().is_empty() {
        return Err(InitializationError::ApiKeyError(
            "API key is empty".to_string(),
        ));
    }

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
        .map_err(|e| InitializationError::ApiKeyError(e.to_string()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("airtable_sync/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_client_rejects_empty_key() {
        assert!(matches!(
            init_client("  "),
            Err(InitializationError::ApiKeyError(_))
        ));
    }

    #[test]
    fn test_init_client_rejects_invalid_header() {
        assert!(matches!(
            init_client("pat\nwith-newline"),
            Err(InitializationError::ApiKeyError(_))
        ));
    }

    #[test]
    fn test_init_client_accepts_token() {
        assert!(init_client("patABC.123").is_ok());
    }
}
