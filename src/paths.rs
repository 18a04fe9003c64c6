//! Key directory search path.
//!
//! The search path is built once from a handful of named inputs into an
//! ordered list. Building it is pure: no filesystem I/O happens here, so the
//! order can be checked without touching disk.

use crate::config::Config;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming the primary key directory.
pub const KEYS_DIR_ENV: &str = "SSM_KEYS_DIR";
/// Subdirectory holding keys next to the binary and the working directory.
pub const KEYS_SUBDIR: &str = "keys";
/// Keys kept alongside YAML config in the working directory.
pub const CONFIG_KEYS_SUBDIR: &str = "config/keys";
/// Per-user key directory, relative to the home directory.
pub const USER_KEYS_SUBDIR: &str = ".ssm/keys";

/// Raw inputs the search path is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySearchInputs {
    /// Value of [`KEYS_DIR_ENV`]; empty when unset.
    pub env_root: String,
    /// `keys_dir` from the resolved configuration.
    pub config_hint: Option<String>,
    /// Directory containing the running executable.
    pub exe_dir: Option<PathBuf>,
    /// Process working directory.
    pub cwd: Option<PathBuf>,
    /// Home directory of the current user.
    pub home_dir: Option<PathBuf>,
}

impl KeySearchInputs {
    /// Gather inputs from the process environment and an optional config.
    pub fn discover(config: Option<&Config>) -> Self {
        Self {
            env_root: std::env::var(KEYS_DIR_ENV).unwrap_or_default(),
            config_hint: config.map(|c| c.keys_dir.clone()),
            exe_dir: binary_dir(),
            cwd: std::env::current_dir().ok(),
            home_dir: dirs::home_dir(),
        }
    }
}

/// Directory containing the running executable.
fn binary_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Which input produced a search directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirSource {
    Environment,
    Config,
    Executable,
    WorkingDir,
    WorkingDirConfig,
    UserHome,
    /// Supplied directly by the caller.
    Explicit,
}

impl fmt::Display for KeyDirSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDirSource::Environment => write!(f, "environment"),
            KeyDirSource::Config => write!(f, "config"),
            KeyDirSource::Executable => write!(f, "executable"),
            KeyDirSource::WorkingDir => write!(f, "working dir"),
            KeyDirSource::WorkingDirConfig => write!(f, "working dir (config)"),
            KeyDirSource::UserHome => write!(f, "user home"),
            KeyDirSource::Explicit => write!(f, "explicit"),
        }
    }
}

/// One entry of the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDirectory {
    pub path: PathBuf,
    pub source: KeyDirSource,
}

impl KeyDirectory {
    /// Candidate path for `file_name` in this directory: `dir + "/" + name`.
    ///
    /// An empty directory yields `/name`, which simply fails to match.
    pub fn candidate(&self, file_name: &str) -> PathBuf {
        let mut joined = OsString::from(self.path.as_os_str());
        joined.push("/");
        joined.push(file_name);
        PathBuf::from(joined)
    }
}

/// Ordered key search path. First existing match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDirectoryList {
    dirs: Vec<KeyDirectory>,
}

impl KeyDirectoryList {
    /// Build the search path.
    ///
    /// Order: environment root (kept even when empty), config hint,
    /// `<exe>/keys`, `<cwd>/keys`, `<cwd>/config/keys`, `~/.ssm/keys`.
    /// Inputs that could not be determined are skipped.
    pub fn build(inputs: &KeySearchInputs) -> Self {
        let mut dirs = vec![KeyDirectory {
            path: PathBuf::from(&inputs.env_root),
            source: KeyDirSource::Environment,
        }];

        if let Some(hint) = inputs.config_hint.as_deref().filter(|h| !h.is_empty()) {
            dirs.push(KeyDirectory {
                path: PathBuf::from(hint),
                source: KeyDirSource::Config,
            });
        }

        if let Some(ref exe_dir) = inputs.exe_dir {
            dirs.push(KeyDirectory {
                path: exe_dir.join(KEYS_SUBDIR),
                source: KeyDirSource::Executable,
            });
        }

        if let Some(ref cwd) = inputs.cwd {
            dirs.push(KeyDirectory {
                path: cwd.join(KEYS_SUBDIR),
                source: KeyDirSource::WorkingDir,
            });
            dirs.push(KeyDirectory {
                path: cwd.join(CONFIG_KEYS_SUBDIR),
                source: KeyDirSource::WorkingDirConfig,
            });
        }

        if let Some(ref home) = inputs.home_dir {
            dirs.push(KeyDirectory {
                path: home.join(USER_KEYS_SUBDIR),
                source: KeyDirSource::UserHome,
            });
        }

        Self { dirs }
    }

    /// Search path made of caller-supplied directories, in order.
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs
                .into_iter()
                .map(|path| KeyDirectory {
                    path: path.into(),
                    source: KeyDirSource::Explicit,
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyDirectory> {
        self.dirs.iter()
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}
