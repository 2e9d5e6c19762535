//! Storage of fitted solutions, keyed by model name and validated by a
//! checksum of the training data and configuration.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::basis::Sizing;
use crate::datasets::TrainingSet;
use crate::hyperparams::RmtValidParams;


const JSON_FORMAT_NAME: &str = "sparsermt-solution";
const JSON_VERSION: u32 = 1;

/// Simplified `Result` using [`CacheError`] as error type
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Error variants of cache storage. They never abort a fit: a failed load is
/// a cache miss and a failed save is only logged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot (de)serialize {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path:?} has format `{found}`, expected `{expected}`")]
    FormatMismatch {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },

    #[error("{path:?} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// A stored solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub checksum: u64,
    pub num: Sizing,
    pub coefficients: Array2<f64>,
}

/// Storage port of fitted solutions.
pub trait SolutionCache: Send + Sync + Debug {
    /// Returns the record stored under `name`, `None` when there is none.
    fn load(&self, name: &str) -> CacheResult<Option<CacheRecord>>;

    fn save(&self, name: &str, record: &CacheRecord) -> CacheResult<()>;
}

/// 64-bit FNV-1a, stable across platforms and toolchains.
struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Fnv1a(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for Fnv1a {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x0100_0000_01b3);
        }
    }
}

/// This function computes the checksum of a fit: the full configuration and
/// every training array, shapes included.
pub fn checksum(params: &RmtValidParams, training: &TrainingSet) -> u64 {
    let mut hasher = Fnv1a::default();
    match serde_json::to_string(params) {
        Ok(json) => json.hash(&mut hasher),
        Err(e) => log::warn!("cannot serialize the configuration for the checksum: {}", e),
    }
    for (kx, xt, yt) in training.iter() {
        (kx as u64).hash(&mut hasher);
        for array in [xt, yt] {
            (array.nrows() as u64).hash(&mut hasher);
            (array.ncols() as u64).hash(&mut hasher);
            for v in array.iter() {
                v.to_bits().hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

#[derive(Serialize)]
struct JsonEnvelopeRef<'a> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    record: &'a CacheRecord,
}

#[derive(Deserialize)]
struct JsonEnvelopeOwned {
    format: String,
    version: u32,
    #[serde(flatten)]
    record: CacheRecord,
}

/// Stores each solution as a versioned JSON file `<name>.json` in a
/// directory.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    dir: PathBuf,
}

impl DirectoryCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        DirectoryCache {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding the record `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl Default for DirectoryCache {
    fn default() -> Self {
        DirectoryCache::new(".")
    }
}

impl SolutionCache for DirectoryCache {
    fn load(&self, name: &str) -> CacheResult<Option<CacheRecord>> {
        let path = self.path(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };
        let env: JsonEnvelopeOwned = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CacheError::Json {
                path: path.clone(),
                source: e,
            })?;
        if env.format != JSON_FORMAT_NAME {
            return Err(CacheError::FormatMismatch {
                path,
                found: env.format,
                expected: JSON_FORMAT_NAME,
            });
        }
        if env.version != JSON_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                found: env.version,
                expected: JSON_VERSION,
            });
        }
        Ok(Some(env.record))
    }

    fn save(&self, name: &str, record: &CacheRecord) -> CacheResult<()> {
        let path = self.path(name);
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let file = File::create(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut w = BufWriter::new(file);
        let env = JsonEnvelopeRef {
            format: JSON_FORMAT_NAME,
            version: JSON_VERSION,
            record,
        };
        serde_json::to_writer(&mut w, &env).map_err(|e| CacheError::Json {
            path: path.clone(),
            source: e,
        })?;
        w.flush().map_err(|e| CacheError::Io { path, source: e })
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: Mutex<HashMap<String, CacheRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SolutionCache for MemoryCache {
    fn load(&self, name: &str) -> CacheResult<Option<CacheRecord>> {
        Ok(self
            .records
            .lock()
            .ok()
            .and_then(|records| records.get(name).cloned()))
    }

    fn save(&self, name: &str, record: &CacheRecord) -> CacheResult<()> {
        if let Ok(mut records) = self.records.lock() {
            records.insert(name.to_string(), record.clone());
        }
        Ok(())
    }
}
