//! Post-scoring enrichment.
//!
//! Everything here runs after confidence is computed and never changes it:
//! the authority heuristic feeds the scorer as an input signal, while
//! package coordinates and Package URLs only decorate finished records.

use super::url::{FORGE_HOSTS, forge_repository, host_and_segments};
use crate::models::PackageCoordinates;
use serde_json::{Map, Value};

/// Organisations whose repositories are treated as official.
pub const KNOWN_ORGANIZATIONS: &[&str] = &[
    "apache",
    "gnu",
    "mirror",
    "torvalds",
    "mozilla",
    "python",
    "rust-lang",
    "nodejs",
    "golang",
    "llvm",
    "openssl",
    "curl",
    "madler",
    "libgit2",
    "ffmpeg",
    "videolan",
    "gnome",
    "kde",
    "freedesktop",
    "sqlite",
    "postgres",
    "git",
    "kubernetes",
    "microsoft",
    "google",
    "facebook",
];

/// Self-hosted project forges; anything they serve is official.
pub const PROJECT_FORGE_HOSTS: &[&str] = &[
    "git.kernel.org",
    "git.savannah.gnu.org",
    "savannah.gnu.org",
    "sourceware.org",
    "gitlab.gnome.org",
    "invent.kde.org",
    "gitlab.freedesktop.org",
    "code.videolan.org",
    "git.ffmpeg.org",
    "gitbox.apache.org",
    "opendev.org",
];

/// URL path segments that mark a non-repository page.
const NON_REPOSITORY_SEGMENTS: &[&str] = &[
    "pull",
    "pulls",
    "issues",
    "wiki",
    "merge_requests",
    "compare",
    "discussions",
];

/// Decides whether an origin belongs to the project's official organisation.
///
/// An `is_official` boolean in the metadata wins. Otherwise a forge
/// repository is official when the owner equals the repository name or is a
/// known organisation, and any origin on a known project forge is official.
#[must_use]
pub fn is_official_organization(origin_url: &str, metadata: &Map<String, Value>) -> bool {
    if let Some(flag) = metadata.get("is_official").and_then(Value::as_bool) {
        return flag;
    }
    if let Some((_, owner, repo)) = forge_repository(origin_url) {
        let owner = owner.to_lowercase();
        return owner == repo.to_lowercase() || KNOWN_ORGANIZATIONS.contains(&owner.as_str());
    }
    host_and_segments(origin_url).is_some_and(|(host, _)| {
        PROJECT_FORGE_HOSTS
            .iter()
            .any(|forge| host == *forge || host.ends_with(&format!(".{forge}")))
    })
}

/// Fills package coordinates for a finished match.
///
/// Implementations must be cheap and side-effect free; they run inline on
/// the ranking path.
pub trait CoordinateExtractor: Send + Sync {
    /// Extracts coordinates, `None` when nothing is known.
    fn extract(&self, origin_url: &str, metadata: &Map<String, Value>) -> Option<PackageCoordinates>;
}

/// Reads `name`, `version`, `license` (and common aliases) from provider
/// metadata, falling back to the repository name for forge URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataCoordinateExtractor;

impl CoordinateExtractor for MetadataCoordinateExtractor {
    fn extract(&self, origin_url: &str, metadata: &Map<String, Value>) -> Option<PackageCoordinates> {
        let name = first_str(metadata, &["name", "package_name"])
            .or_else(|| forge_repository(origin_url).map(|(_, _, repo)| repo));
        let coordinates = PackageCoordinates {
            name,
            version: first_str(metadata, &["version", "tag", "release"]),
            license: first_str(metadata, &["license", "license_spdx", "spdx_license_key"]),
        };
        (!coordinates.is_empty()).then_some(coordinates)
    }
}

fn first_str(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| metadata.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Generates Package URLs for confident matches.
///
/// # Example
///
/// ```rust
/// use srcorigin::models::PackageCoordinates;
/// use srcorigin::services::PurlGenerator;
///
/// let coordinates = PackageCoordinates {
///     name: Some("serde".into()),
///     version: Some("1.0.0".into()),
///     license: None,
/// };
/// let purl = PurlGenerator::default().generate("https://crates.io/crates/serde", &coordinates, 0.9);
/// assert_eq!(purl.as_deref(), Some("pkg:cargo/serde@1.0.0"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PurlGenerator {
    threshold: f64,
}

impl Default for PurlGenerator {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl PurlGenerator {
    /// Creates a generator with a minimum confidence.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Builds a Package URL, or `None` if confidence is too low, the name is
    /// missing, or the URL is not a recognised package or repository page.
    #[must_use]
    pub fn generate(
        &self,
        download_url: &str,
        coordinates: &PackageCoordinates,
        confidence: f64,
    ) -> Option<String> {
        if confidence < self.threshold {
            return None;
        }
        let name = coordinates.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        let (host, segments) = host_and_segments(download_url)?;

        let base = if FORGE_HOSTS.contains(&host.as_str()) {
            if segments.len() < 2
                || segments
                    .iter()
                    .skip(2)
                    .any(|s| NON_REPOSITORY_SEGMENTS.contains(&s.as_str()) || s == "-")
            {
                return None;
            }
            let kind = host.split('.').next()?;
            let repo = segments[1].strip_suffix(".git").unwrap_or(&segments[1]);
            format!("pkg:{kind}/{}/{}", segments[0].to_lowercase(), repo.to_lowercase())
        } else {
            match host.as_str() {
                "pypi.org" | "pypi.python.org" => format!("pkg:pypi/{}", normalize_pypi_name(name)),
                "npmjs.org" | "npmjs.com" | "registry.npmjs.org" => match name.strip_prefix('@') {
                    Some(scoped) => format!("pkg:npm/%40{}", scoped.to_lowercase()),
                    None => format!("pkg:npm/{}", name.to_lowercase()),
                },
                "crates.io" => format!("pkg:cargo/{name}"),
                _ => return None,
            }
        };

        let version = coordinates
            .version
            .as_deref()
            .map(strip_version_prefix)
            .filter(|v| !v.is_empty());
        Some(match version {
            Some(version) => format!("{base}@{version}"),
            None => base,
        })
    }
}

fn normalize_pypi_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

fn strip_version_prefix(version: &str) -> &str {
    let version = version.trim();
    match version.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => version,
    }
}
