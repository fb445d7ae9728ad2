//! Canonicalization and one-way hashing of identity fields.
//!
//! The conversion API matches users on SHA-256 hex digests of normalized values. A field
//! that is missing or blank after trimming yields `None`, and the caller must drop the key
//! rather than send a digest of the empty string.

use crate::config::IdentityFieldSet;
use crate::submission::RawSubmission;
use serde::Serialize;
use sha2::{Digest, Sha256};

fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Trims and lowercases before hashing.
pub fn hash_email(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(sha256_hex(&trimmed.to_lowercase()))
}

/// Names use the same rule as emails.
pub fn hash_name(raw: Option<&str>) -> Option<String> {
    hash_email(raw)
}

/// Keeps only ASCII digits (country code included if the client sent one), then hashes.
///
/// No E.164 validation happens here. Input without any digit is treated as absent.
pub fn hash_phone(raw: Option<&str>) -> Option<String> {
    let digits: String = raw?.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(sha256_hex(&digits))
}

/// Hashed identity keys of `user_data`. Each present key holds exactly one digest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em: Option<[String; 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<[String; 1]>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<[String; 1]>,
    #[serde(rename = "ln", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<[String; 1]>,
}

impl NormalizedIdentity {
    pub fn from_submission(raw: &RawSubmission, field_set: IdentityFieldSet) -> Self {
        let (first_name, last_name) = match field_set {
            IdentityFieldSet::SplitName => (
                hash_name(raw.first_name.as_deref()),
                hash_name(raw.last_name.as_deref()),
            ),
            IdentityFieldSet::FullName => (hash_name(raw.full_name.as_deref()), None),
        };

        NormalizedIdentity {
            em: hash_email(raw.email.as_deref()).map(|h| [h]),
            ph: hash_phone(raw.phone.as_deref()).map(|h| [h]),
            first_name: first_name.map(|h| [h]),
            last_name: last_name.map(|h| [h]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.em.is_none() && self.ph.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}
