// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Random identifiers: channel tokens and server-generated nonces.

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::RelayError;

/// Bytes of entropy behind a channel token (256 bits).
const TOKEN_BYTES: usize = 32;

const NONCE_LEN: usize = 16;
const NONCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn random_bytes<const N: usize>() -> Result<[u8; N], RelayError> {
    let mut bytes = [0u8; N];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| RelayError::Internal("system random source unavailable".to_string()))?;
    Ok(bytes)
}

/// A fresh URL-safe channel token (base64url, no padding).
pub fn generate_token() -> Result<String, RelayError> {
    let bytes = random_bytes::<TOKEN_BYTES>()?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// A fresh alphanumeric nonce, used when the app does not supply one.
pub fn generate_nonce() -> Result<String, RelayError> {
    // 248 is the largest multiple of 62 below 256; rejecting above it keeps the draw unbiased.
    let mut nonce = String::with_capacity(NONCE_LEN);
    while nonce.len() < NONCE_LEN {
        for byte in random_bytes::<32>()? {
            if byte < 248 && nonce.len() < NONCE_LEN {
                nonce.push(NONCE_ALPHABET[usize::from(byte) % NONCE_ALPHABET.len()] as char);
            }
        }
    }
    Ok(nonce)
}

/// Short, log-safe prefix of a token.
pub fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
