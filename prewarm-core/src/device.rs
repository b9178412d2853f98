use crate::format::size_pretty;
use crate::platform;
use anyhow::{Result, bail};
use std::fmt;
use std::path::{Path, PathBuf};

/// A block device targeted for prewarming.
///
/// The size is queried once, at probe time, and cached for the lifetime of
/// the run.
#[derive(Clone, Debug)]
pub struct Device {
    /// The system path to the device (e.g., `/dev/xvdf`).
    pub path: PathBuf,
    /// The total size of the device in bytes.
    pub size_bytes: u64,
}

impl Device {
    /// Resolves a device path into a [`Device`], querying its byte size.
    pub fn probe(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Device {} does not exist", path.display());
        }

        let size_bytes = platform::device_size(path)?;

        Ok(Device {
            path: path.to_path_buf(),
            size_bytes,
        })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), size_pretty(self.size_bytes))
    }
}
