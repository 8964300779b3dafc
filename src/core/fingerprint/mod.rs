//! # Fingerprint Module
//!
//! Cheap content fingerprints for duplicate candidacy.
//!
//! Only the first 64 KiB of a file are hashed. Together with the file size
//! this is a "probably identical" signal that stays fast on multi-gigabyte
//! video. A file that cannot be read still gets a fingerprint so indexing
//! never stalls, but it is tagged [`FingerprintKind::Fallback`] and never
//! matches anything.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_128;

/// Number of leading bytes hashed per file
pub const PREFIX_BYTES: u64 = 64 * 1024;

/// How a fingerprint was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintKind {
    /// Hash of the file's leading bytes
    Content,
    /// Hash of `(path, size)` because the file could not be read
    Fallback,
}

impl FingerprintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintKind::Content => "content",
            FingerprintKind::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "content" => Some(FingerprintKind::Content),
            "fallback" => Some(FingerprintKind::Fallback),
            _ => None,
        }
    }
}

/// Partial hash plus file size
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// 32 hex characters of xxh3-128
    pub partial_hash: String,
    /// File size in bytes at fingerprint time
    pub size: u64,
    pub kind: FingerprintKind,
}

impl Fingerprint {
    /// Equal size and prefix hash; never true for fallback fingerprints.
    pub fn is_candidate_duplicate(&self, other: &Fingerprint) -> bool {
        self.kind == FingerprintKind::Content
            && other.kind == FingerprintKind::Content
            && self.size == other.size
            && self.partial_hash == other.partial_hash
    }
}

fn to_hex(hash: u128) -> String {
    format!("{:032x}", hash)
}

fn read_prefix(path: &Path) -> std::io::Result<(Vec<u8>, u64)> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut buffer = Vec::with_capacity(PREFIX_BYTES.min(size) as usize);
    file.take(PREFIX_BYTES).read_to_end(&mut buffer)?;
    Ok((buffer, size))
}

/// Fingerprint a file, degrading to a tagged fallback on read failure
pub fn fingerprint(path: &Path) -> Fingerprint {
    match read_prefix(path) {
        Ok((prefix, size)) => Fingerprint {
            partial_hash: to_hex(xxh3_128(&prefix)),
            size,
            kind: FingerprintKind::Content,
        },
        Err(e) => {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            tracing::warn!(path = %path.display(), error = %e, "unreadable file, using fallback fingerprint");
            let seed = format!("{}:{}", path.display(), size);
            Fingerprint {
                partial_hash: to_hex(xxh3_128(seed.as_bytes())),
                size,
                kind: FingerprintKind::Fallback,
            }
        }
    }
}
