//! Content identifiers and directory manifests.
//!
//! A [`ContentIdentifier`] is the canonical, metadata-independent name of a
//! file (`blob`) or directory (`tree`). Its textual form is
//! `cid:1:<kind>:<hex>` where `<hex>` is the lowercase SHA-256 digest of the
//! typed object encoding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Identifier scheme prefix.
pub const IDENTIFIER_SCHEME: &str = "cid";

/// Identifier format version.
pub const IDENTIFIER_VERSION: u32 = 1;

/// Length of the binary digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Kind of object an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// File content (also used for symlink targets).
    Blob,
    /// Directory structure.
    Tree,
}

impl ObjectKind {
    /// Returns the kind as used in headers and identifier strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
        }
    }

    /// Parses a kind string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(Self::Blob),
            "tree" => Some(Self::Tree),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Versioned, typed content hash.
///
/// Two identifiers are equal exactly when kind and digest are equal. Distinct
/// trees are only distinct with cryptographic-hash odds; nothing here assumes
/// collision freedom beyond that.
///
/// # Example
///
/// ```rust
/// use srcorigin::models::{ContentIdentifier, ObjectKind};
///
/// let id = ContentIdentifier::new(ObjectKind::Blob, [0u8; 32]);
/// let text = id.to_string();
/// assert!(text.starts_with("cid:1:blob:"));
/// assert_eq!(text.parse::<ContentIdentifier>().ok(), Some(id));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentIdentifier {
    kind: ObjectKind,
    digest: [u8; DIGEST_LEN],
}

impl ContentIdentifier {
    /// Creates an identifier from a kind and raw digest.
    #[must_use]
    pub const fn new(kind: ObjectKind, digest: [u8; DIGEST_LEN]) -> Self {
        Self { kind, digest }
    }

    /// Returns the object kind.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Returns the lowercase hex digest.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Returns true for directory identifiers.
    #[must_use]
    pub const fn is_tree(&self) -> bool {
        matches!(self.kind, ObjectKind::Tree)
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{IDENTIFIER_SCHEME}:{IDENTIFIER_VERSION}:{}:{}",
            self.kind,
            self.hex()
        )
    }
}

impl fmt::Debug for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentIdentifier({self})")
    }
}

/// Error returned when an identifier string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed content identifier '{input}': {reason}")]
pub struct ParseIdentifierError {
    input: String,
    reason: &'static str,
}

impl FromStr for ContentIdentifier {
    type Err = ParseIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ParseIdentifierError {
            input: s.to_string(),
            reason,
        };

        let mut parts = s.split(':');
        let (Some(scheme), Some(version), Some(kind), Some(hex_digest), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(fail("expected scheme:version:kind:hex"));
        };

        if scheme != IDENTIFIER_SCHEME {
            return Err(fail("unknown scheme"));
        }
        if version.parse::<u32>().ok() != Some(IDENTIFIER_VERSION) {
            return Err(fail("unsupported version"));
        }
        let kind = ObjectKind::parse(kind).ok_or_else(|| fail("unknown kind"))?;
        if hex_digest.len() != DIGEST_LEN * 2
            || !hex_digest.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(fail("digest must be 64 lowercase hex characters"));
        }

        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(hex_digest, &mut digest).map_err(|_| fail("invalid hex digest"))?;
        Ok(Self { kind, digest })
    }
}

impl Serialize for ContentIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Flattened view of a directory tree used for fuzzy comparison.
///
/// File paths are relative to the manifest root, `/`-separated, and map to the
/// blob identifier of the file (or symlink target). `directories` lists every
/// sub-directory path, including empty ones; the root itself is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryManifest {
    /// Identifier of the root tree.
    pub root: ContentIdentifier,
    /// Relative file path to blob identifier.
    pub files: BTreeMap<String, ContentIdentifier>,
    /// Relative directory paths.
    #[serde(default)]
    pub directories: BTreeSet<String>,
}

impl DirectoryManifest {
    /// Number of files in the manifest.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Returns true when the manifest contains no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Set of distinct blob identifiers.
    #[must_use]
    pub fn content_set(&self) -> BTreeSet<ContentIdentifier> {
        self.files.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let id = ContentIdentifier::new(ObjectKind::Tree, [0xab; 32]);
        assert_eq!(id.to_string(), format!("cid:1:tree:{}", "ab".repeat(32)));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = ContentIdentifier::new(ObjectKind::Blob, [7; 32]);
        let parsed: ContentIdentifier = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.kind(), ObjectKind::Blob);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let digest = "00".repeat(32);
        assert!(format!("swh:1:tree:{digest}").parse::<ContentIdentifier>().is_err());
        assert!(format!("cid:2:tree:{digest}").parse::<ContentIdentifier>().is_err());
        assert!(format!("cid:1:dir:{digest}").parse::<ContentIdentifier>().is_err());
        assert!("cid:1:tree:abc".parse::<ContentIdentifier>().is_err());
        assert!(format!("cid:1:tree:{}", "AB".repeat(32)).parse::<ContentIdentifier>().is_err());
        assert!(format!("cid:1:tree:{digest}:x").parse::<ContentIdentifier>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id = ContentIdentifier::new(ObjectKind::Tree, [1; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ContentIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_manifest_content_set_dedupes() {
        let blob = ContentIdentifier::new(ObjectKind::Blob, [2; 32]);
        let mut files = BTreeMap::new();
        files.insert("a.c".to_string(), blob);
        files.insert("b.c".to_string(), blob);
        let manifest = DirectoryManifest {
            root: ContentIdentifier::new(ObjectKind::Tree, [3; 32]),
            files,
            directories: BTreeSet::new(),
        };
        assert_eq!(manifest.file_count(), 2);
        assert_eq!(manifest.content_set().len(), 1);
    }
}
