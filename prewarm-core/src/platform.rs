//! Provides platform-specific functionality.
//!
//! This module contains the logic for interacting with the operating system to
//! perform tasks that are not cross-platform: querying a block device's size
//! and checking the mount table.
//!
//! The prewarm workflow is built on Unix process signals and `dd`, so the
//! only submodule is the Linux one. It exposes a platform-neutral API
//! (`device_size`, `is_mounted`) so the rest of the library does not need to
//! know how the answers are obtained.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::*;
