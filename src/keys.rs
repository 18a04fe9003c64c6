//! Key file discovery.
//!
//! Searches the [`KeyDirectoryList`] in order and returns the first match.
//! Stat failures other than "not found" are logged and treated as a miss so
//! one inaccessible directory cannot hide a key that exists elsewhere.

use crate::config::{self, Config};
use crate::error::{KeyError, KeyResult};
use crate::paths::{KeyDirSource, KeyDirectoryList, KeySearchInputs};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace, warn};

/// Filesystem access used by the resolver.
pub trait FileProbe {
    /// Whether `path` is an existing regular file.
    fn is_file(&self, path: &Path) -> io::Result<bool>;

    /// Read the whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// [`FileProbe`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProbe;

impl FileProbe for OsProbe {
    fn is_file(&self, path: &Path) -> io::Result<bool> {
        std::fs::metadata(path).map(|meta| meta.is_file())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// A key file found on the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub contents: Vec<u8>,
    pub path: PathBuf,
    pub source: KeyDirSource,
}

/// Key files referenced by a configuration.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub client_public: ResolvedKey,
    pub client_private: ResolvedKey,
    pub server_public: ResolvedKey,
}

/// First-match-wins search over an ordered directory list.
#[derive(Debug, Clone)]
pub struct KeyResolver<P = OsProbe> {
    dirs: KeyDirectoryList,
    probe: P,
}

impl KeyResolver<OsProbe> {
    pub fn new(dirs: KeyDirectoryList) -> Self {
        Self::with_probe(dirs, OsProbe)
    }
}

impl<P: FileProbe> KeyResolver<P> {
    pub fn with_probe(dirs: KeyDirectoryList, probe: P) -> Self {
        Self { dirs, probe }
    }

    pub fn directories(&self) -> &KeyDirectoryList {
        &self.dirs
    }

    /// Find the first directory holding `file_name`.
    pub fn locate(&self, file_name: &str) -> KeyResult<(PathBuf, KeyDirSource)> {
        for dir in self.dirs.iter() {
            let candidate = dir.candidate(file_name);
            match self.probe.is_file(&candidate) {
                Ok(true) => {
                    debug!(key = file_name, path = %candidate.display(), source = %dir.source, "Key file found");
                    return Ok((candidate, dir.source));
                }
                Ok(false) => {
                    trace!(path = %candidate.display(), "Key candidate is not a regular file");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!(path = %candidate.display(), "Key candidate does not exist");
                }
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "Cannot stat key candidate, skipping");
                }
            }
        }

        Err(KeyError::NotFound {
            name: file_name.to_string(),
        })
    }

    /// Locate and read a key file, keeping where it came from.
    pub fn load_resolved(&self, file_name: &str) -> KeyResult<ResolvedKey> {
        let (path, source) = self.locate(file_name)?;
        let contents = self
            .probe
            .read(&path)
            .map_err(|source| KeyError::Read {
                path: path.clone(),
                source,
            })?;
        Ok(ResolvedKey {
            contents,
            path,
            source,
        })
    }

    /// Contents of the first matching key file.
    pub fn load(&self, file_name: &str) -> KeyResult<Vec<u8>> {
        self.load_resolved(file_name).map(|key| key.contents)
    }

    /// Load the client and server keys named by `config`.
    pub fn load_material(&self, config: &Config) -> KeyResult<KeyMaterial> {
        Ok(KeyMaterial {
            client_public: self.load_resolved(&config.client_public_key)?,
            client_private: self.load_resolved(&config.client_private_key)?,
            server_public: self.load_resolved(&config.server_public_key)?,
        })
    }
}

static RESOLVER: OnceLock<KeyResolver> = OnceLock::new();

/// Process-wide resolver, built on first use.
///
/// The search path takes the `keys_dir` hint from the global configuration
/// when it resolved successfully.
pub fn resolver() -> &'static KeyResolver {
    RESOLVER.get_or_init(|| {
        let inputs = KeySearchInputs::discover(config::try_get().ok());
        KeyResolver::new(KeyDirectoryList::build(&inputs))
    })
}

/// Load a key file through the process-wide search path.
pub fn load_key_file(file_name: &str) -> KeyResult<Vec<u8>> {
    resolver().load(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory probe recording every path it is asked about.
    #[derive(Default)]
    struct FakeProbe {
        files: HashMap<PathBuf, Vec<u8>>,
        denied: Vec<PathBuf>,
        stats: RefCell<Vec<PathBuf>>,
    }

    impl FileProbe for FakeProbe {
        fn is_file(&self, path: &Path) -> io::Result<bool> {
            self.stats.borrow_mut().push(path.to_path_buf());
            if self.denied.iter().any(|d| path.starts_with(d)) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            if self.files.contains_key(path) {
                Ok(true)
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
            }
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    #[test]
    fn test_permission_error_is_a_miss_and_search_stops_at_match() {
        let probe = FakeProbe {
            files: [
                (PathBuf::from("/b/k.pem"), b"from-b".to_vec()),
                (PathBuf::from("/c/k.pem"), b"from-c".to_vec()),
            ]
            .into_iter()
            .collect(),
            denied: vec![PathBuf::from("/a")],
            ..Default::default()
        };
        let resolver =
            KeyResolver::with_probe(KeyDirectoryList::from_dirs(["/a", "/b", "/c"]), probe);

        assert_eq!(resolver.load("k.pem").unwrap(), b"from-b");
        let stats = resolver.probe.stats.borrow();
        assert_eq!(
            *stats,
            vec![PathBuf::from("/a/k.pem"), PathBuf::from("/b/k.pem")]
        );
    }

    #[test]
    fn test_not_found_names_file() {
        let resolver =
            KeyResolver::with_probe(KeyDirectoryList::from_dirs(["/a", ""]), FakeProbe::default());
        let err = resolver.load("missing.pem").unwrap_err();
        assert!(matches!(err, KeyError::NotFound { ref name } if name == "missing.pem"));
        assert_eq!(resolver.probe.stats.borrow().len(), 2);
    }

    #[test]
    fn test_os_probe_finds_file_in_second_dir() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(second.join("server.pub"), "PUBLIC").unwrap();

        let resolver = KeyResolver::new(KeyDirectoryList::from_dirs([
            PathBuf::new(),
            first.clone(),
            second.clone(),
        ]));
        let key = resolver.load_resolved("server.pub").unwrap();
        assert_eq!(key.contents, b"PUBLIC");
        assert_eq!(key.path, second.join("server.pub"));
        assert_eq!(key.source, KeyDirSource::Explicit);
    }

    #[test]
    fn test_directory_with_key_name_is_skipped() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        std::fs::create_dir_all(first.join("client.key")).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(second.join("client.key"), "SECRET").unwrap();

        let resolver = KeyResolver::new(KeyDirectoryList::from_dirs([first, second]));
        assert_eq!(resolver.load("client.key").unwrap(), b"SECRET");
    }

    #[test]
    fn test_load_material() {
        let temp = TempDir::new().unwrap();
        for (name, body) in [("c.pub", "cp"), ("c.key", "ck"), ("s.pub", "sp")] {
            std::fs::write(temp.path().join(name), body).unwrap();
        }
        let config = Config {
            client_public_key: "c.pub".into(),
            client_private_key: "c.key".into(),
            server_public_key: "s.pub".into(),
            ..Default::default()
        };
        let resolver = KeyResolver::new(KeyDirectoryList::from_dirs([temp.path()]));
        let material = resolver.load_material(&config).unwrap();
        assert_eq!(material.client_public.contents, b"cp");
        assert_eq!(material.client_private.contents, b"ck");
        assert_eq!(material.server_public.contents, b"sp");
    }
}
