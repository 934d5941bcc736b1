//! Content addressing for files and directories.
//!
//! Identifiers are Merkle hashes over typed object encodings:
//!
//! ```text
//! blob: sha256("blob <len>\0" ++ bytes)
//! tree: sha256("tree <len>\0" ++ for each entry sorted by name bytes:
//!                "<mode> <name>\0" ++ <32-byte child digest>)
//! ```
//!
//! Modes are `100644` (regular), `100755` (executable), `40000` (directory)
//! and `120000` (symlink). Timestamps, ownership and every permission bit
//! other than the executable bit are ignored. Symlinks are hashed as a blob
//! of their target and never followed. Sockets, FIFOs and device nodes are
//! skipped.

use crate::models::{ContentIdentifier, DIGEST_LEN, DirectoryManifest, ObjectKind};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::instrument;

/// Directory names excluded from tree hashing by default.
pub const DEFAULT_HASH_EXCLUDES: &[&str] = &[".git", ".hg", ".svn", ".bzr"];

/// Errors raised while addressing a path.
///
/// Either error is scoped to the subtree being hashed; callers hashing many
/// candidates treat it as "no identifier" for that candidate only.
#[derive(Debug, Error)]
pub enum AddressingError {
    /// An entry could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A directory was reached twice along one descent.
    #[error("directory cycle detected at {}", path.display())]
    Cycle {
        /// Directory that closes the cycle.
        path: PathBuf,
    },
}

impl AddressingError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Tree entry mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Regular file.
    Regular,
    /// File with any executable bit set.
    Executable,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl EntryMode {
    /// Mode string used in tree encodings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "100644",
            Self::Executable => "100755",
            Self::Directory => "40000",
            Self::Symlink => "120000",
        }
    }
}

/// Computes content identifiers.
///
/// # Example
///
/// ```rust
/// use srcorigin::services::ContentAddresser;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("a.c"), b"int main;").unwrap();
///
/// let addresser = ContentAddresser::new();
/// let first = addresser.identify(dir.path()).unwrap();
/// let second = addresser.identify(dir.path()).unwrap();
/// assert_eq!(first, second);
/// assert!(first.is_tree());
/// ```
#[derive(Debug, Clone)]
pub struct ContentAddresser {
    excludes: HashSet<OsString>,
}

impl Default for ContentAddresser {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentAddresser {
    /// Creates an addresser with the default exclusions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_excludes(DEFAULT_HASH_EXCLUDES.iter().copied())
    }

    /// Creates an addresser that skips directories with the given names.
    #[must_use]
    pub fn with_excludes<I, S>(excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self {
            excludes: excludes
                .into_iter()
                .map(|s| s.as_ref().to_os_string())
                .collect(),
        }
    }

    /// Identifier of an in-memory blob.
    #[must_use]
    pub fn hash_blob(bytes: &[u8]) -> ContentIdentifier {
        let mut hasher = Sha256::new();
        hasher.update(header(ObjectKind::Blob, bytes.len() as u64));
        hasher.update(bytes);
        ContentIdentifier::new(ObjectKind::Blob, hasher.finalize().into())
    }

    /// Identifies a file, symlink, or directory.
    ///
    /// # Errors
    ///
    /// Returns [`AddressingError::Io`] if any entry cannot be read and
    /// [`AddressingError::Cycle`] if a directory is its own ancestor.
    #[instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    pub fn identify(&self, path: &Path) -> Result<ContentIdentifier, AddressingError> {
        let meta = fs::symlink_metadata(path).map_err(|e| AddressingError::io(path, e))?;
        let mut walker = Walker::new(self, None);
        walker.object(path, &meta, "")
    }

    /// Identifies a directory and records every file and directory below it.
    ///
    /// # Errors
    ///
    /// Same as [`ContentAddresser::identify`]; a non-directory path yields a
    /// manifest with a single file entry named after the path.
    #[instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    pub fn manifest(&self, path: &Path) -> Result<DirectoryManifest, AddressingError> {
        let meta = fs::symlink_metadata(path).map_err(|e| AddressingError::io(path, e))?;
        let mut walker = Walker::new(self, Some(ManifestSink::default()));
        let root = if meta.is_dir() {
            walker.object(path, &meta, "")?
        } else {
            let name = path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            walker.object(path, &meta, &name)?
        };
        let sink = walker.sink.unwrap_or_default();
        Ok(DirectoryManifest {
            root,
            files: sink.files,
            directories: sink.directories,
        })
    }

    fn is_excluded(&self, name: &OsStr) -> bool {
        self.excludes.contains(name)
    }
}

#[derive(Debug, Default)]
struct ManifestSink {
    files: BTreeMap<String, ContentIdentifier>,
    directories: BTreeSet<String>,
}

/// Identity of a directory for cycle detection.
#[cfg(unix)]
type DirKey = (u64, u64);
#[cfg(not(unix))]
type DirKey = PathBuf;

struct Walker<'a> {
    addresser: &'a ContentAddresser,
    ancestors: Vec<DirKey>,
    sink: Option<ManifestSink>,
}

impl<'a> Walker<'a> {
    fn new(addresser: &'a ContentAddresser, sink: Option<ManifestSink>) -> Self {
        Self {
            addresser,
            ancestors: Vec::new(),
            sink,
        }
    }

    /// Hashes one object; `rel` is its manifest path ("" for the root).
    fn object(
        &mut self,
        path: &Path,
        meta: &Metadata,
        rel: &str,
    ) -> Result<ContentIdentifier, AddressingError> {
        let file_type = meta.file_type();
        if file_type.is_dir() {
            return self.tree(path, rel);
        }

        let id = if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| AddressingError::io(path, e))?;
            ContentAddresser::hash_blob(&name_bytes(target.as_os_str()))
        } else {
            hash_file(path)?
        };
        if let Some(sink) = self.sink.as_mut()
            && !rel.is_empty()
        {
            sink.files.insert(rel.to_string(), id);
        }
        Ok(id)
    }

    fn tree(&mut self, path: &Path, rel: &str) -> Result<ContentIdentifier, AddressingError> {
        let key = dir_key(path)?;
        if self.ancestors.contains(&key) {
            return Err(AddressingError::Cycle {
                path: path.to_path_buf(),
            });
        }
        self.ancestors.push(key);
        let result = self.tree_entries(path, rel);
        self.ancestors.pop();
        result
    }

    fn tree_entries(&mut self, path: &Path, rel: &str) -> Result<ContentIdentifier, AddressingError> {
        if let Some(sink) = self.sink.as_mut()
            && !rel.is_empty()
        {
            sink.directories.insert(rel.to_string());
        }

        let mut children: Vec<(Vec<u8>, PathBuf, Metadata)> = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| AddressingError::io(path, e))? {
            let entry = entry.map_err(|e| AddressingError::io(path, e))?;
            let child = entry.path();
            let meta = fs::symlink_metadata(&child).map_err(|e| AddressingError::io(&child, e))?;
            let name = entry.file_name();
            let file_type = meta.file_type();

            if file_type.is_dir() && self.addresser.is_excluded(&name) {
                continue;
            }
            if !(file_type.is_dir() || file_type.is_file() || file_type.is_symlink()) {
                tracing::debug!(path = %child.display(), "Skipping special file");
                continue;
            }
            children.push((name_bytes(&name).into_owned(), child, meta));
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        let mut body = Vec::with_capacity(children.len() * (DIGEST_LEN + 24));
        for (name, child, meta) in &children {
            let child_rel = join_rel(rel, &String::from_utf8_lossy(name));
            let id = self.object(child, meta, &child_rel)?;
            body.extend_from_slice(entry_mode(meta).as_str().as_bytes());
            body.push(b' ');
            body.extend_from_slice(name);
            body.push(0);
            body.extend_from_slice(id.digest());
        }

        let mut hasher = Sha256::new();
        hasher.update(header(ObjectKind::Tree, body.len() as u64));
        hasher.update(&body);
        Ok(ContentIdentifier::new(ObjectKind::Tree, hasher.finalize().into()))
    }
}

fn header(kind: ObjectKind, len: u64) -> Vec<u8> {
    format!("{kind} {len}\0").into_bytes()
}

fn hash_file(path: &Path) -> Result<ContentIdentifier, AddressingError> {
    let mut file = File::open(path).map_err(|e| AddressingError::io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| AddressingError::io(path, e))?
        .len();

    let mut hasher = Sha256::new();
    hasher.update(header(ObjectKind::Blob, len));
    let copied = io::copy(&mut (&mut file).take(len), &mut hasher)
        .map_err(|e| AddressingError::io(path, e))?;
    if copied != len {
        return Err(AddressingError::io(
            path,
            io::Error::new(io::ErrorKind::UnexpectedEof, "file shrank while hashing"),
        ));
    }
    Ok(ContentIdentifier::new(ObjectKind::Blob, hasher.finalize().into()))
}

fn entry_mode(meta: &Metadata) -> EntryMode {
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        EntryMode::Symlink
    } else if file_type.is_dir() {
        EntryMode::Directory
    } else if is_executable(meta) {
        EntryMode::Executable
    } else {
        EntryMode::Regular
    }
}

#[cfg(unix)]
fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
const fn is_executable(_meta: &Metadata) -> bool {
    false
}

#[cfg(unix)]
fn dir_key(path: &Path) -> Result<DirKey, AddressingError> {
    use std::os::unix::fs::MetadataExt;
    let meta = fs::metadata(path).map_err(|e| AddressingError::io(path, e))?;
    Ok((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_key(path: &Path) -> Result<DirKey, AddressingError> {
    fs::canonicalize(path).map_err(|e| AddressingError::io(path, e))
}

#[cfg(unix)]
fn name_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

#[cfg(not(unix))]
fn name_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sha(bytes: &[u8]) -> [u8; 32] {
        Sha256::digest(bytes).into()
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main.c", b"int main(void) { return 0; }\n");
        write(dir.path(), "src/util.h", b"#pragma once\n");
        write(dir.path(), "README", b"hello\n");
        dir
    }

    #[test]
    fn test_blob_encoding() {
        let id = ContentAddresser::hash_blob(b"hello");
        assert_eq!(id.kind(), ObjectKind::Blob);
        assert_eq!(*id.digest(), sha(b"blob 5\0hello"));
    }

    #[test]
    fn test_file_matches_in_memory_blob() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "f.txt", b"hello");
        let id = ContentAddresser::new().identify(&dir.path().join("f.txt")).unwrap();
        assert_eq!(id, ContentAddresser::hash_blob(b"hello"));
    }

    #[test]
    fn test_empty_tree_encoding() {
        let dir = TempDir::new().unwrap();
        let id = ContentAddresser::new().identify(dir.path()).unwrap();
        assert!(id.is_tree());
        assert_eq!(*id.digest(), sha(b"tree 0\0"));
    }

    #[test]
    #[cfg(unix)]
    fn test_single_entry_tree_encoding() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a", b"x");
        fs::set_permissions(dir.path().join("a"), fs::Permissions::from_mode(0o644)).unwrap();

        let blob = ContentAddresser::hash_blob(b"x");
        let mut body = b"100644 a\0".to_vec();
        body.extend_from_slice(blob.digest());
        let mut expected = format!("tree {}\0", body.len()).into_bytes();
        expected.extend_from_slice(&body);

        let id = ContentAddresser::new().identify(dir.path()).unwrap();
        assert_eq!(*id.digest(), sha(&expected));
    }

    #[test]
    fn test_identical_trees_identical_ids() {
        let a = sample_tree();
        let b = sample_tree();
        let addresser = ContentAddresser::new();
        assert_eq!(
            addresser.identify(a.path()).unwrap(),
            addresser.identify(b.path()).unwrap()
        );
    }

    #[test]
    fn test_creation_order_irrelevant() {
        let a = TempDir::new().unwrap();
        for name in ["z.c", "a.c", "m.c"] {
            write(a.path(), name, name.as_bytes());
        }
        let b = TempDir::new().unwrap();
        for name in ["a.c", "m.c", "z.c"] {
            write(b.path(), name, name.as_bytes());
        }
        let addresser = ContentAddresser::new();
        assert_eq!(
            addresser.identify(a.path()).unwrap(),
            addresser.identify(b.path()).unwrap()
        );
    }

    #[test]
    fn test_single_byte_change_changes_id() {
        let a = sample_tree();
        let b = sample_tree();
        write(b.path(), "src/util.h", b"#pragma twice\n");
        let addresser = ContentAddresser::new();
        assert_ne!(
            addresser.identify(a.path()).unwrap(),
            addresser.identify(b.path()).unwrap()
        );
    }

    #[test]
    fn test_rename_changes_id() {
        let a = sample_tree();
        let b = sample_tree();
        fs::rename(b.path().join("README"), b.path().join("README.md")).unwrap();
        let addresser = ContentAddresser::new();
        assert_ne!(
            addresser.identify(a.path()).unwrap(),
            addresser.identify(b.path()).unwrap()
        );
    }

    #[test]
    fn test_vcs_metadata_excluded() {
        let a = sample_tree();
        let b = sample_tree();
        write(b.path(), ".git/HEAD", b"ref: refs/heads/main\n");
        let addresser = ContentAddresser::new();
        assert_eq!(
            addresser.identify(a.path()).unwrap(),
            addresser.identify(b.path()).unwrap()
        );

        let strict = ContentAddresser::with_excludes(Vec::<String>::new());
        assert_ne!(
            strict.identify(a.path()).unwrap(),
            strict.identify(b.path()).unwrap()
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_executable_bit_changes_id() {
        use std::os::unix::fs::PermissionsExt;
        let a = sample_tree();
        let b = sample_tree();
        let script = b.path().join("src/main.c");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(a.path().join("src/main.c"), fs::Permissions::from_mode(0o644))
            .unwrap();
        let addresser = ContentAddresser::new();
        assert_ne!(
            addresser.identify(a.path()).unwrap(),
            addresser.identify(b.path()).unwrap()
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_hashed_as_target_not_followed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "real.txt", b"payload");
        std::os::unix::fs::symlink("real.txt", dir.path().join("link")).unwrap();

        let manifest = ContentAddresser::new().manifest(dir.path()).unwrap();
        assert_eq!(
            manifest.files.get("link"),
            Some(&ContentAddresser::hash_blob(b"real.txt"))
        );
        assert_ne!(manifest.files.get("link"), manifest.files.get("real.txt"));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_to_ancestor_does_not_loop() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sub/file.c", b"x");
        std::os::unix::fs::symlink("..", dir.path().join("sub/up")).unwrap();
        assert!(ContentAddresser::new().identify(dir.path()).is_ok());
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let err = ContentAddresser::new()
            .identify(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, AddressingError::Io { .. }));
    }

    #[test]
    fn test_manifest_contents() {
        let dir = sample_tree();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let addresser = ContentAddresser::new();
        let manifest = addresser.manifest(dir.path()).unwrap();

        assert_eq!(manifest.root, addresser.identify(dir.path()).unwrap());
        assert_eq!(
            manifest.files.keys().cloned().collect::<Vec<_>>(),
            vec!["README", "src/main.c", "src/util.h"]
        );
        assert!(manifest.directories.contains("src"));
        assert!(manifest.directories.contains("empty"));
        assert_eq!(
            manifest.files.get("README"),
            Some(&ContentAddresser::hash_blob(b"hello\n"))
        );
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!(EntryMode::Regular.as_str(), "100644");
        assert_eq!(EntryMode::Executable.as_str(), "100755");
        assert_eq!(EntryMode::Directory.as_str(), "40000");
        assert_eq!(EntryMode::Symlink.as_str(), "120000");
    }
}
