//! Identification services.
//!
//! Leaf services are synchronous and side-effect free; only the
//! [`DiscoveryOrchestrator`] suspends, at provider and cache boundaries.
//!
//! | Service | Role |
//! |---------|------|
//! | [`ContentAddresser`] | Merkle identifiers for files and directories |
//! | [`CandidateScanner`] | Directory candidates around a scan origin |
//! | [`FuzzyMatcher`] | Three-tier similarity on identifier misses |
//! | [`ConfidenceScorer`] | Multi-factor confidence |
//! | [`DiscoveryOrchestrator`] | The full pipeline |

mod addressing;
mod discovery;
mod enrichment;
mod fuzzy;
mod scanner;
mod scoring;
mod url;

pub use addressing::{AddressingError, ContentAddresser, DEFAULT_HASH_EXCLUDES, EntryMode};
pub use discovery::DiscoveryOrchestrator;
pub use enrichment::{
    CoordinateExtractor, KNOWN_ORGANIZATIONS, MetadataCoordinateExtractor, PROJECT_FORGE_HOSTS,
    PurlGenerator, is_official_organization,
};
pub use fuzzy::{
    CONTENT_WEIGHT, FuzzyMatch, FuzzyMatcher, STRUCTURE_WEIGHT, TierScores, jaccard,
    structural_similarity,
};
pub use scanner::{CandidateScanner, PACKAGE_INDICATORS, SKIP_DIRS, SOURCE_EXTENSIONS};
pub use scoring::{
    AUTHORITY_MULTIPLIER, ConfidenceScorer, EXACT_BASE, FREQUENCY_CAP, FREQUENCY_STEP,
    FUZZY_FACTOR, ScoreInput, authority_multiplier, base_score, frequency_multiplier,
    recency_multiplier,
};
pub use url::{FORGE_HOSTS, forge_repository, normalize_origin_url};
