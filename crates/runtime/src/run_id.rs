use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = ".monkey_";
const HASH_LEN: usize = 16;

/// Identity of one run: the working directory it belongs to plus a slot
/// number distinguishing concurrent or successive runs from that directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId {
    pub dir_hash: String,
    pub slot: u32,
}

impl RunId {
    /// Next free slot for the current working directory.
    pub fn for_current_dir(state_dir: &Path) -> io::Result<Self> {
        let cwd = std::env::current_dir()?.canonicalize()?;
        Self::for_dir(&cwd, state_dir)
    }

    pub fn for_dir(dir: &Path, state_dir: &Path) -> io::Result<Self> {
        let dir_hash = dir_hash(dir);
        let slot = highest_slot(&dir_hash, state_dir)? + 1;
        Ok(Self { dir_hash, slot })
    }

    pub fn with_slot(&self, slot: u32) -> Self {
        Self {
            dir_hash: self.dir_hash.clone(),
            slot,
        }
    }

    pub fn snapshot_path(&self, state_dir: &Path) -> PathBuf {
        state_dir.join(format!("{self}.env"))
    }

    pub fn log_path(&self, state_dir: &Path) -> PathBuf {
        state_dir.join(format!("{self}.log"))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FILE_PREFIX}{}_{}", self.dir_hash, self.slot)
    }
}

pub fn dir_hash(dir: &Path) -> String {
    let digest = Sha256::digest(dir.as_os_str().as_encoded_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}

/// Highest slot used by an existing `.env` or `.log` file, 0 if none.
fn highest_slot(dir_hash: &str, state_dir: &Path) -> io::Result<u32> {
    let entries = match std::fs::read_dir(state_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let prefix = format!("{FILE_PREFIX}{dir_hash}_");
    let mut highest = 0;
    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(slot) = parse_slot(name, &prefix) {
            highest = highest.max(slot);
        }
    }
    Ok(highest)
}

fn parse_slot(name: &str, prefix: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?;
    let digits = rest
        .strip_suffix(".env")
        .or_else(|| rest.strip_suffix(".log"))?;
    digits.parse().ok()
}
