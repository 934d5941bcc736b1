//! Data models for origin identification.
//!
//! - [`ContentIdentifier`] / [`DirectoryManifest`]: content-addressed names
//! - [`DirectoryCandidate`]: a local directory worth looking up
//! - [`OriginCandidate`]: a raw provider result
//! - [`MatchRecord`]: a scored, deduplicated result
//! - [`DiscoveryReport`]: the outcome of a run

mod candidate;
mod identifier;
mod matching;

pub use candidate::{
    CandidateRelation, DirectoryCandidate, OriginCandidate, specificity_for_depth,
};
pub use identifier::{
    ContentIdentifier, DIGEST_LEN, DirectoryManifest, IDENTIFIER_SCHEME, IDENTIFIER_VERSION,
    ObjectKind, ParseIdentifierError,
};
pub use matching::{DiscoveryReport, MatchRecord, MatchType, PackageCoordinates};
