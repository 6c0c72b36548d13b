// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-encoding signature schemes.
//!
//! The scheme is picked from the shape of the candidate identity, never from
//! caller-supplied metadata:
//!
//! | Identity encoding | Scheme |
//! |-------------------|--------|
//! | `0x` + 40 hex chars | EIP-191 personal-sign, secp256k1 recovery |
//! | base58 decoding to 32 bytes | Ed25519 over the raw message bytes |

use std::str::FromStr;

use alloy::primitives::{Address, Signature as EvmSignature};
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Verification strategy bound to one candidate identity.
#[derive(Debug, Clone)]
pub enum SignatureScheme {
    /// Account-based chains: recover the signer address from an EIP-191 signature.
    Eip191(Address),
    /// Base58-keyed chains: verify an Ed25519 signature against the 32-byte public key.
    Ed25519([u8; 32]),
}

impl SignatureScheme {
    /// Select a scheme by inspecting how `identity` is encoded.
    ///
    /// Returns `None` for encodings no scheme understands.
    pub fn detect(identity: &str) -> Option<Self> {
        if is_evm_address(identity) {
            return Address::from_str(identity).ok().map(SignatureScheme::Eip191);
        }
        if is_base58(identity) {
            let bytes: [u8; 32] = bs58::decode(identity).into_vec().ok()?.try_into().ok()?;
            return Some(SignatureScheme::Ed25519(bytes));
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignatureScheme::Eip191(_) => "eip191",
            SignatureScheme::Ed25519(_) => "ed25519",
        }
    }

    /// Signature length in bytes this scheme expects.
    pub fn signature_len(&self) -> usize {
        match self {
            SignatureScheme::Eip191(_) => 65,
            SignatureScheme::Ed25519(_) => 64,
        }
    }

    /// Check `signature` over `message` against the bound identity.
    pub fn verify(&self, message: &str, signature: &[u8]) -> bool {
        match self {
            SignatureScheme::Eip191(expected) => EvmSignature::from_raw(signature)
                .ok()
                .and_then(|sig| sig.recover_address_from_msg(message.as_bytes()).ok())
                .is_some_and(|recovered| recovered == *expected),
            SignatureScheme::Ed25519(public_key) => {
                let Ok(key) = VerifyingKey::from_bytes(public_key) else {
                    return false;
                };
                <[u8; 64]>::try_from(signature)
                    .map(|bytes| Ed25519Signature::from_bytes(&bytes))
                    .is_ok_and(|sig| key.verify(message.as_bytes(), &sig).is_ok())
            }
        }
    }
}

/// Decode a submitted signature: `0x`-prefixed hex, or base58.
pub fn decode_signature(signature: &str) -> Option<Vec<u8>> {
    let signature = signature.trim();
    if let Some(hex) = signature.strip_prefix("0x") {
        return alloy::hex::decode(hex).ok();
    }
    if is_base58(signature) {
        return bs58::decode(signature).into_vec().ok();
    }
    None
}

fn is_evm_address(identity: &str) -> bool {
    identity
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_base58(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| BASE58_ALPHABET.contains(c))
}
