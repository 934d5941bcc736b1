//! Origin URL normalization.
//!
//! Two spellings of the same repository must collapse to one key so
//! deduplication can group them:
//!
//! | Input | Normalized |
//! |-------|------------|
//! | `HTTPS://GitHub.com/curl/curl.git/` | `https://github.com/curl/curl` |
//! | `git@github.com:curl/curl.git` | `https://github.com/curl/curl` |
//! | `https://github.com/curl/curl/tree/master/lib` | `https://github.com/curl/curl` |
//! | `https://user:pw@example.org:443/x/?q=1#frag` | `https://example.org/x` |

/// Hosts whose first two path segments name a repository.
pub const FORGE_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Normalizes an origin URL.
///
/// Lowercases scheme and host, drops userinfo, default ports, query,
/// fragment and trailing slashes, rewrites scp-style `user@host:path` to
/// `https`, and truncates forge URLs to `https://<host>/<owner>/<repo>`
/// without a `.git` suffix. Inputs that are not URLs are returned trimmed.
///
/// # Example
///
/// ```rust
/// use srcorigin::services::normalize_origin_url;
///
/// assert_eq!(
///     normalize_origin_url("git@github.com:madler/zlib.git"),
///     "https://github.com/madler/zlib"
/// );
/// ```
#[must_use]
pub fn normalize_origin_url(raw: &str) -> String {
    let Some(parts) = UrlParts::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    parts.render()
}

/// Lowercased host and non-empty path segments of a URL.
pub(crate) fn host_and_segments(url: &str) -> Option<(String, Vec<String>)> {
    UrlParts::parse(url.trim()).map(|parts| (parts.host, parts.segments))
}

/// `(host, owner, repo)` for forge URLs, after normalization.
#[must_use]
pub fn forge_repository(url: &str) -> Option<(String, String, String)> {
    let parts = UrlParts::parse(url.trim())?;
    if !FORGE_HOSTS.contains(&parts.host.as_str()) {
        return None;
    }
    let mut segments = parts.segments.iter();
    let owner = segments.next()?.clone();
    let repo = strip_git_suffix(segments.next()?).to_string();
    Some((parts.host, owner, repo))
}

#[derive(Debug)]
struct UrlParts {
    scheme: String,
    host: String,
    port: Option<String>,
    segments: Vec<String>,
}

impl UrlParts {
    fn parse(input: &str) -> Option<Self> {
        if input.is_empty() || input.chars().any(char::is_whitespace) {
            return None;
        }

        let (scheme, rest) = match input.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest.to_string()),
            None => (String::from("https"), scp_to_path(input)?),
        };
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
            return None;
        }

        let rest = rest.split(['#', '?']).next().unwrap_or_default();
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
                (host, Some(port.to_string()))
            },
            _ => (host_port, None),
        };
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        if host.is_empty() || (!host.contains('.') && host != "localhost") {
            return None;
        }

        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();

        let port = port.filter(|p| !is_default_port(&scheme, p));
        Some(Self {
            scheme,
            host,
            port,
            segments,
        })
    }

    fn render(mut self) -> String {
        if FORGE_HOSTS.contains(&self.host.as_str()) && self.segments.len() >= 2 {
            self.segments.truncate(2);
            let repo = strip_git_suffix(&self.segments[1]).to_string();
            self.segments[1] = repo;
            self.scheme = String::from("https");
            self.port = None;
        } else if let Some(last) = self.segments.last_mut()
            && last.ends_with(".git")
            && last.len() > 4
        {
            *last = strip_git_suffix(last).to_string();
        }

        let mut out = format!("{}://{}", self.scheme, self.host);
        if let Some(port) = &self.port {
            out.push(':');
            out.push_str(port);
        }
        for segment in &self.segments {
            out.push('/');
            out.push_str(segment);
        }
        out
    }
}

/// `user@host:owner/repo` to `host/owner/repo`; schemeless `host/path` passes through.
fn scp_to_path(input: &str) -> Option<String> {
    let Some((host_part, path)) = input.split_once(':') else {
        return Some(input.to_string());
    };
    let host = host_part.rsplit_once('@').map_or(host_part, |(_, h)| h);
    if host.is_empty() || host.contains('/') || path.is_empty() {
        return None;
    }
    Some(format!("{host}/{}", path.trim_start_matches('/')))
}

fn strip_git_suffix(segment: &str) -> &str {
    segment.strip_suffix(".git").filter(|s| !s.is_empty()).unwrap_or(segment)
}

fn is_default_port(scheme: &str, port: &str) -> bool {
    matches!((scheme, port), ("https", "443") | ("http", "80") | ("ssh", "22"))
}
