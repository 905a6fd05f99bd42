//! Cache key construction.
//!
//! Keys are `<namespace>:<part>[:<part>...]`. The store treats them as opaque
//! strings apart from prefix matching during invalidation.

use std::fmt::Display;

use sha2::{Digest, Sha256};

/// Hex digits kept from an argument digest.
const ARGS_DIGEST_LEN: usize = 32;

/// Join a namespace and its parts: `cover`, `[123, "L"]` gives `cover:123:L`.
pub fn join_key<I>(namespace: &str, parts: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut key = namespace.to_string();
    for part in parts {
        key.push(':');
        key.push_str(&part.to_string());
    }
    key
}

/// Pattern matching every key of a namespace.
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{namespace}:*")
}

/// Stable short digest of an argument list, for keys built from arbitrary
/// caller input.
pub fn hash_parts<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(ARGS_DIGEST_LEN);
    digest
}
