//! The core, UI-agnostic library for the `prewarm` block-device utility.
//!
//! Lazily-provisioned volumes (network-backed or thin-provisioned storage)
//! only reach full bandwidth once every block has been touched. `prewarm-core`
//! forces that by partitioning a device into disjoint block ranges and
//! running one external copy-in-place worker per range, rewriting the device
//! onto itself without moving any data.
//!
//! The library is structured into several key modules:
//! - [`device`]: The probed `Device` struct (path and cached byte size).
//! - [`platform`]: Platform-specific device size and mount-table queries.
//! - [`partition`]: The block-range partitioning scheme.
//! - [`worker`]: The spawned copy process and its signal-driven status polling.
//! - [`prewarm`]: The supervisor that runs workers to completion.
//!
//! The primary entry point is [`prewarm::Prewarmer`]. Construction validates
//! the target device; the run itself reports an aggregate snapshot to a
//! callback once per polling interval, allowing the calling application to
//! render progress in any way it chooses.
//!
//! ## Example: Prewarming a device
//!
//! ```rust,no_run
//! use prewarm_core::prewarm::Prewarmer;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use std::time::Duration;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let prewarmer = Prewarmer::new(Path::new("/dev/xvdf"), 4, Duration::from_secs(5))?;
//!
//!     // A shared flag to allow for graceful cancellation.
//!     let running = Arc::new(AtomicBool::new(true));
//!
//!     prewarmer.prewarm(running, |snapshot| {
//!         println!("{}", snapshot.render());
//!     })?;
//!
//!     println!("Prewarm complete!");
//!
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod format;
pub mod partition;
pub mod platform;
pub mod prewarm;
pub mod status;
pub mod worker;
