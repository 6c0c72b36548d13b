// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in message parsing (EIP-4361 text format).
//!
//! ```text
//! {domain} wants you to sign in with your Ethereum account:
//! {address}
//!
//! {statement}
//!
//! URI: {uri}
//! Version: 1
//! Chain ID: {chain_id}
//! Nonce: {nonce}
//! Issued At: {issued_at}
//! Expiration Time: {expiration_time}   (optional)
//! Not Before: {not_before}             (optional)
//! Request ID: {request_id}             (optional)
//! Resources:                           (optional)
//! - farcaster://fid/{fid}
//! ```

use chrono::{DateTime, Utc};

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const FID_RESOURCE_PREFIX: &str = "farcaster://fid/";

/// Why a message failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("missing header line")]
    MissingHeader,
    #[error("missing address line")]
    MissingAddress,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("unexpected line: {0}")]
    UnexpectedLine(String),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// A parsed sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    pub domain: String,
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
    pub expiration_time: Option<String>,
    pub not_before: Option<String>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

impl SignInMessage {
    /// Parse the text form of a sign-in message.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let mut lines = text.lines().peekable();

        let domain = lines
            .next()
            .and_then(|line| line.strip_suffix(HEADER_SUFFIX))
            .filter(|domain| !domain.is_empty())
            .ok_or(MessageError::MissingHeader)?
            .to_string();

        let address = lines
            .next()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or(MessageError::MissingAddress)?
            .to_string();

        // Everything up to the URI line is blank padding around the optional statement.
        let mut statement_lines = Vec::new();
        while let Some(line) = lines.peek() {
            if line.starts_with("URI: ") {
                break;
            }
            if !line.is_empty() {
                statement_lines.push(line.to_string());
            }
            lines.next();
        }
        let statement = (!statement_lines.is_empty()).then(|| statement_lines.join("\n"));

        let mut uri = None;
        let mut version = None;
        let mut chain_id = None;
        let mut nonce = None;
        let mut issued_at = None;
        let mut expiration_time = None;
        let mut not_before = None;
        let mut request_id = None;
        let mut resources = Vec::new();

        while let Some(line) = lines.next() {
            if line == "Resources:" {
                for resource in lines.by_ref() {
                    let item = resource
                        .strip_prefix("- ")
                        .ok_or_else(|| MessageError::UnexpectedLine(resource.to_string()))?;
                    resources.push(item.to_string());
                }
                break;
            }

            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| MessageError::UnexpectedLine(line.to_string()))?;
            let value = value.to_string();
            match key {
                "URI" => uri = Some(value),
                "Version" => version = Some(value),
                "Chain ID" => {
                    let parsed = value.parse::<u64>().map_err(|_| MessageError::InvalidValue {
                        field: "Chain ID",
                        value: value.clone(),
                    })?;
                    chain_id = Some(parsed);
                }
                "Nonce" => nonce = Some(value),
                "Issued At" => issued_at = Some(value),
                "Expiration Time" => expiration_time = Some(value),
                "Not Before" => not_before = Some(value),
                "Request ID" => request_id = Some(value),
                _ => return Err(MessageError::UnexpectedLine(line.to_string())),
            }
        }

        let version = version.ok_or(MessageError::MissingField("Version"))?;
        if version != "1" {
            return Err(MessageError::UnsupportedVersion(version));
        }

        let message = Self {
            domain,
            address,
            statement,
            uri: uri.ok_or(MessageError::MissingField("URI"))?,
            version,
            chain_id: chain_id.ok_or(MessageError::MissingField("Chain ID"))?,
            nonce: nonce.ok_or(MessageError::MissingField("Nonce"))?,
            issued_at: issued_at.ok_or(MessageError::MissingField("Issued At"))?,
            expiration_time,
            not_before,
            request_id,
            resources,
        };

        parse_timestamp("Issued At", &message.issued_at)?;
        if let Some(ts) = &message.expiration_time {
            parse_timestamp("Expiration Time", ts)?;
        }
        if let Some(ts) = &message.not_before {
            parse_timestamp("Not Before", ts)?;
        }

        Ok(message)
    }

    /// The account id carried in the `farcaster://fid/{fid}` resource.
    pub fn fid(&self) -> Option<u64> {
        self.resources
            .iter()
            .find_map(|r| r.strip_prefix(FID_RESOURCE_PREFIX))
            .and_then(|fid| fid.parse().ok())
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration_time
            .as_deref()
            .and_then(|ts| parse_timestamp("Expiration Time", ts).ok())
    }

    pub fn not_before_time(&self) -> Option<DateTime<Utc>> {
        self.not_before
            .as_deref()
            .and_then(|ts| parse_timestamp("Not Before", ts).ok())
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, MessageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| MessageError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
pub(crate) fn build_message(domain: &str, address: &str, uri: &str, nonce: &str, fid: u64) -> String {
    format!(
        "{domain}{HEADER_SUFFIX}\n{address}\n\nFarcaster Connect\n\nURI: {uri}\nVersion: 1\nChain ID: 10\nNonce: {nonce}\nIssued At: 2026-10-19T12:00:00.000Z\nResources:\n- {FID_RESOURCE_PREFIX}{fid}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x8773442740C17C9d0F0B87022c722F9a136206eD";

    #[test]
    fn parses_full_message() {
        let text = build_message("example.com", ADDRESS, "https://example.com", "abcd1234", 1);
        let message = SignInMessage::parse(&text).unwrap();

        assert_eq!(message.domain, "example.com");
        assert_eq!(message.address, ADDRESS);
        assert_eq!(message.statement.as_deref(), Some("Farcaster Connect"));
        assert_eq!(message.uri, "https://example.com");
        assert_eq!(message.chain_id, 10);
        assert_eq!(message.nonce, "abcd1234");
        assert_eq!(message.fid(), Some(1));
        assert!(message.expiration().is_none());
    }

    #[test]
    fn parses_without_statement_and_with_optional_fields() {
        let text = format!(
            "example.com{HEADER_SUFFIX}\n{ADDRESS}\n\nURI: https://example.com/login\nVersion: 1\nChain ID: 1\nNonce: n0nce\nIssued At: 2026-01-01T00:00:00Z\nExpiration Time: 2026-01-02T00:00:00Z\nNot Before: 2025-12-31T00:00:00Z\nRequest ID: req-7"
        );
        let message = SignInMessage::parse(&text).unwrap();

        assert!(message.statement.is_none());
        assert_eq!(message.request_id.as_deref(), Some("req-7"));
        assert!(message.expiration().is_some());
        assert!(message.not_before_time().is_some());
        assert!(message.resources.is_empty());
        assert_eq!(message.fid(), None);
    }

    #[test]
    fn rejects_missing_header() {
        let err = SignInMessage::parse("hello world").unwrap_err();
        assert_eq!(err, MessageError::MissingHeader);
    }

    #[test]
    fn rejects_missing_nonce() {
        let text = format!(
            "example.com{HEADER_SUFFIX}\n{ADDRESS}\n\nURI: https://example.com\nVersion: 1\nChain ID: 10\nIssued At: 2026-01-01T00:00:00Z"
        );
        let err = SignInMessage::parse(&text).unwrap_err();
        assert_eq!(err, MessageError::MissingField("Nonce"));
    }

    #[test]
    fn rejects_unknown_field_and_bad_version() {
        let unknown = build_message("example.com", ADDRESS, "https://example.com", "n", 1)
            .replace("Chain ID: 10", "Chain: 10");
        assert!(matches!(
            SignInMessage::parse(&unknown),
            Err(MessageError::UnexpectedLine(_))
        ));

        let version = build_message("example.com", ADDRESS, "https://example.com", "n", 1)
            .replace("Version: 1", "Version: 2");
        assert_eq!(
            SignInMessage::parse(&version).unwrap_err(),
            MessageError::UnsupportedVersion("2".to_string())
        );
    }

    #[test]
    fn rejects_invalid_timestamp() {
        let text = build_message("example.com", ADDRESS, "https://example.com", "n", 1)
            .replace("2026-10-19T12:00:00.000Z", "yesterday");
        assert!(matches!(
            SignInMessage::parse(&text),
            Err(MessageError::InvalidValue { field: "Issued At", .. })
        ));
    }
}
