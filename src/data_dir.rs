use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default overall memory budget handed to each index writer.
pub const DEFAULT_WRITER_MEMORY: usize = 50_000_000;

/// Smallest budget Tantivy accepts for a single indexing thread.
pub const MIN_WRITER_MEMORY: usize = 15_000_000;

/// Process-wide settings shared by every index definition.
#[derive(Debug, Clone)]
pub struct Settings {
    base: PathBuf,
    writer_memory: usize,
}

impl Settings {
    /// Resolve settings from the environment.
    ///
    /// The base index directory is, in order: `explicit` (from
    /// `--index-dir`), `NEED_INDEX_DIR`, then `need/indexes` under the XDG
    /// data home. It is created when missing. `NEED_WRITER_MEMORY`
    /// overrides the writer memory budget in bytes.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let base = match explicit {
            Some(path) => path.to_path_buf(),
            None => env_base()?,
        };
        std::fs::create_dir_all(&base)
            .map_err(|_| Error::DataDir(base.clone()))?;

        let writer_memory = parse_writer_memory(
            std::env::var("NEED_WRITER_MEMORY").ok().as_deref(),
        )?;
        Ok(Self {
            base,
            writer_memory,
        })
    }

    pub fn with_writer_memory(mut self, bytes: usize) -> Self {
        self.writer_memory = bytes;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn writer_memory(&self) -> usize {
        self.writer_memory
    }

    /// Directory holding the index called `index_name`.
    pub fn index_dir(&self, index_name: &str) -> PathBuf {
        self.base.join(index_name)
    }
}

fn env_base() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("NEED_INDEX_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let data_home = xdg::BaseDirectories::with_prefix("need")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })?;
    Ok(data_home.join("indexes"))
}

/// Writer budget from an optional override. Tantivy needs at least
/// [`MIN_WRITER_MEMORY`] bytes per indexing thread.
fn parse_writer_memory(value: Option<&str>) -> Result<usize> {
    let Some(value) = value else {
        return Ok(DEFAULT_WRITER_MEMORY);
    };
    match value.trim().parse::<usize>() {
        Ok(bytes) if bytes >= MIN_WRITER_MEMORY => Ok(bytes),
        _ => Err(Error::Config(format!(
            "NEED_WRITER_MEMORY must be a byte count of at least \
             {MIN_WRITER_MEMORY}, got {value:?}"
        ))),
    }
}
