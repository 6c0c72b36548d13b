// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application-level shared secret required to authenticate a channel.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fixed HMAC key. Only equality of the tags matters, so it need not be secret.
const TAG_KEY: &[u8] = b"connect-relay/auth-key";

/// Expected auth key, compared in constant time.
#[derive(Clone)]
pub struct AuthKey {
    tag: Vec<u8>,
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthKey(..)")
    }
}

fn tag_of(value: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(TAG_KEY).ok()?;
    mac.update(value.as_bytes());
    Some(mac)
}

impl AuthKey {
    pub fn new(expected: &str) -> Self {
        // An empty tag never verifies.
        let tag = tag_of(expected)
            .map(|mac| mac.finalize().into_bytes().to_vec())
            .unwrap_or_default();
        Self { tag }
    }

    /// Whether `candidate` equals the configured key.
    pub fn matches(&self, candidate: &str) -> bool {
        tag_of(candidate).is_some_and(|mac| mac.verify_slice(&self.tag).is_ok())
    }
}
