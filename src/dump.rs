//! Debugging aid for rewritten streams the host refuses to verify: the
//! offending bytes can be persisted for offline inspection. Not part of
//! the functional contract.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

/// Environment value naming the dump directory.
pub const DUMP_DIR_VAR: &str = "LATEBIND_DUMP_DIR";

/// Writes rejected class bytes to a configured directory.
#[derive(Clone, Debug, Default)]
pub struct ClassDump {
    directory: Option<PathBuf>,
}

impl ClassDump {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        ClassDump {
            directory: Some(directory.into()),
        }
    }

    /// A dump that drops everything.
    pub fn disabled() -> Self {
        ClassDump { directory: None }
    }

    /// Reads the dump directory from [`DUMP_DIR_VAR`]; disabled when the
    /// value is unset.
    pub fn from_env() -> Self {
        ClassDump {
            directory: std::env::var_os(DUMP_DIR_VAR).map(PathBuf::from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Persists the bytes of a rejected class, returning the path written,
    /// or `None` when dumping is disabled.
    pub fn write(&self, internal_name: &str, bytes: &[u8]) -> io::Result<Option<PathBuf>> {
        let Some(directory) = &self.directory else {
            return Ok(None);
        };
        fs::create_dir_all(directory)?;
        let path = directory.join(format!("{}.class", internal_name.replace('/', ".")));
        fs::write(&path, bytes)?;
        warn!(class = internal_name, path = %path.display(), "dumped rejected class");
        Ok(Some(path))
    }
}
