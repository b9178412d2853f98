//! Orchestrates a prewarm run: validates the target device, partitions it
//! into disjoint block ranges, spawns one copy worker per range, and polls
//! the workers to completion while aggregating their stats.

use crate::device::Device;
use crate::format::{duration_short, size_pretty};
use crate::partition::{Span, partition};
use crate::platform;
use crate::worker::{DdHandle, Worker};
use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Supervises the prewarming of one block device.
///
/// Construction performs all precondition checks; no worker is spawned until
/// [`Prewarmer::prewarm`] is called.
///
/// Real I/O parallelism comes from the spawned copy processes. The supervisor
/// itself is single-threaded: each tick sweeps the workers in partition
/// order, reports an aggregate snapshot, and sleeps for the configured
/// interval.
#[derive(Debug)]
pub struct Prewarmer {
    device: Device,
    worker_count: u32,
    interval: Duration,
}

impl Prewarmer {
    /// Validates the target and builds a supervisor for it.
    ///
    /// # Errors
    ///
    /// Fails when the device path does not exist, the device reports a size
    /// of zero, the device (or a partition on it) is currently mounted, or
    /// `worker_count` is zero. The checks run once, here, and are not
    /// re-verified during the run.
    pub fn new(device_path: &Path, worker_count: u32, interval: Duration) -> Result<Self> {
        if worker_count == 0 {
            bail!("Worker count must be at least 1");
        }

        let device = Device::probe(device_path)?;
        if device.size_bytes == 0 {
            bail!("Device {} is empty", device_path.display());
        }
        if platform::is_mounted(device_path) {
            bail!("Device {} is already mounted", device_path.display());
        }

        Ok(Prewarmer {
            device,
            worker_count,
            interval,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The block ranges the workers will be assigned, in partition order.
    pub fn spans(&self) -> Vec<Span> {
        partition(self.device.size_bytes, self.worker_count)
    }

    /// Runs the prewarm to completion.
    ///
    /// Spawns all workers up front, then polls them once per interval until
    /// every worker is complete, invoking `on_tick` with an aggregate
    /// [`Snapshot`] after each sweep. Clearing `running` aborts the run and
    /// terminates the remaining workers.
    pub fn prewarm<F>(&self, running: Arc<AtomicBool>, on_tick: F) -> Result<()>
    where
        F: FnMut(&Snapshot),
    {
        let mut workers = Vec::with_capacity(self.worker_count as usize);
        for span in self.spans() {
            let handle = DdHandle::spawn(&self.device.path, &span)?;
            workers.push(Worker::new(Box::new(handle)));
        }

        supervise(
            &mut workers,
            self.device.size_bytes,
            self.interval,
            &running,
            on_tick,
        )
    }
}

/// A point-in-time aggregate over all workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Total size of the device in bytes.
    pub device_size: u64,
    /// Sum of bytes copied across all workers.
    pub bytes_completed: u64,
    /// Sum of the workers' most recent rate samples, in bytes per second.
    pub total_rate: u64,
    /// Workers whose last status parse is within the staleness threshold.
    pub up_to_date: usize,
    /// Workers whose process has exited and whose status stream is drained.
    pub complete: usize,
}

impl Snapshot {
    fn collect(workers: &mut [Worker], device_size: u64) -> Self {
        let mut snapshot = Snapshot {
            device_size,
            bytes_completed: 0,
            total_rate: 0,
            up_to_date: 0,
            complete: 0,
        };

        for worker in workers.iter_mut() {
            snapshot.bytes_completed += worker.bytes_completed();
            snapshot.total_rate += worker.rate();
            if worker.up_to_date() {
                snapshot.up_to_date += 1;
            }
            if worker.complete() {
                snapshot.complete += 1;
            }
        }

        snapshot
    }

    /// Renders the one-line progress report for this snapshot.
    ///
    /// When the aggregate rate is zero there is no finite ETA and the
    /// sentinel `Infinity` is printed instead.
    pub fn render(&self) -> String {
        let eta = if self.total_rate > 0 {
            let remaining = self.device_size.saturating_sub(self.bytes_completed);
            duration_short(remaining / self.total_rate)
        } else {
            "Infinity".to_string()
        };

        format!(
            "{} / {} ({:.2}%) [{}/s] {} UpToDate - {} Complete - ETA {}",
            size_pretty(self.bytes_completed),
            size_pretty(self.device_size),
            100.0 * self.bytes_completed as f64 / self.device_size as f64,
            size_pretty(self.total_rate),
            self.up_to_date,
            self.complete,
            eta,
        )
    }
}

/// The polling loop: refresh every worker, report, sleep, repeat until all
/// workers are complete.
fn supervise<F>(
    workers: &mut [Worker],
    device_size: u64,
    interval: Duration,
    running: &AtomicBool,
    mut on_tick: F,
) -> Result<()>
where
    F: FnMut(&Snapshot),
{
    loop {
        if workers.iter_mut().all(Worker::complete) {
            return Ok(());
        }

        if !running.load(Ordering::SeqCst) {
            for worker in workers.iter_mut() {
                worker.terminate()?;
            }
            bail!("Operation cancelled by user");
        }

        for worker in workers.iter_mut() {
            worker.update_status()?;
        }

        on_tick(&Snapshot::collect(workers, device_size));
        thread::sleep(interval);
    }
}
