// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deep link handed from the app to the wallet.
//!
//! `{base}?channelToken={token}&nonce={nonce}&siweUri={uri}&domain={domain}`
//!
//! The wallet parses the token back out and fetches the remaining signature
//! parameters from the status endpoint.

use url::Url;

use crate::error::RelayError;
use crate::storage::SignatureParams;

const CHANNEL_TOKEN_PARAM: &str = "channelToken";

/// Fields recovered from a connect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectUri {
    pub channel_token: String,
    pub nonce: Option<String>,
    pub siwe_uri: Option<String>,
    pub domain: Option<String>,
}

/// Build the connect URI for a new channel.
pub fn build_connect_uri(
    base: &str,
    token: &str,
    params: &SignatureParams,
) -> Result<String, RelayError> {
    let url = Url::parse_with_params(
        base,
        &[
            (CHANNEL_TOKEN_PARAM, token),
            ("nonce", params.nonce.as_str()),
            ("siweUri", params.siwe_uri.as_str()),
            ("domain", params.domain.as_str()),
        ],
    )
    .map_err(|e| RelayError::Internal(format!("invalid connect URI base {base}: {e}")))?;
    Ok(url.into())
}

/// Parse a connect URI, as a wallet would.
pub fn parse_connect_uri(uri: &str) -> Result<ConnectUri, RelayError> {
    let url = Url::parse(uri).map_err(|e| RelayError::Validation(format!("invalid URI: {e}")))?;
    let find = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    let channel_token = find(CHANNEL_TOKEN_PARAM)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| RelayError::Validation("URI has no channelToken".to_string()))?;

    Ok(ConnectUri {
        channel_token,
        nonce: find("nonce"),
        siwe_uri: find("siweUri"),
        domain: find("domain"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SignatureParams {
        SignatureParams {
            siwe_uri: "https://example.com/login?next=/home".to_string(),
            domain: "example.com".to_string(),
            nonce: "abcd1234".to_string(),
            not_before: None,
            expiration_time: None,
            request_id: None,
        }
    }

    #[test]
    fn built_uri_parses_back() {
        let uri = build_connect_uri(
            "https://warpcast.com/~/sign-in-with-farcaster",
            "tok_-123",
            &params(),
        )
        .unwrap();
        assert!(uri.starts_with("https://warpcast.com/~/sign-in-with-farcaster?channelToken=tok_-123"));

        let parsed = parse_connect_uri(&uri).unwrap();
        assert_eq!(parsed.channel_token, "tok_-123");
        assert_eq!(parsed.nonce.as_deref(), Some("abcd1234"));
        assert_eq!(parsed.siwe_uri.as_deref(), Some("https://example.com/login?next=/home"));
        assert_eq!(parsed.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn custom_scheme_base_is_supported() {
        let uri = build_connect_uri("farcaster://connect", "t", &params()).unwrap();
        assert_eq!(parse_connect_uri(&uri).unwrap().channel_token, "t");
    }

    #[test]
    fn missing_token_is_rejected() {
        assert!(matches!(
            parse_connect_uri("https://warpcast.com/~/sign-in-with-farcaster?nonce=x"),
            Err(RelayError::Validation(_))
        ));
        assert!(matches!(
            parse_connect_uri("not a uri"),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn invalid_base_is_internal_error() {
        assert!(matches!(
            build_connect_uri("::", "t", &params()),
            Err(RelayError::Internal(_))
        ));
    }
}
