//! One worker per assigned block range: an external `dd` copying the range
//! onto itself, supervised through signal-triggered status dumps.
//!
//! `dd` has no progress-streaming API. On receipt of `SIGUSR1` it writes a
//! transfer summary to stderr, so each refresh delivers the signal, waits
//! briefly for the handler to flush, and then drains whatever is available
//! from the pipe without blocking. The process interaction is isolated behind
//! [`WorkerHandle`] so the bookkeeping in [`Worker`] can be driven by a fake
//! in tests.

use crate::partition::Span;
use crate::status;
use anyhow::{Context, Result, anyhow};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Delay between delivering the progress signal and reading the pipe, giving
/// the signal handler a chance to flush a status line.
const SIGNAL_FLUSH_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on a single non-blocking status read.
const READ_CHUNK: usize = 8192;

/// A worker with no successful status parse for this long is considered to
/// have gone silent.
const STALE_AFTER: Duration = Duration::from_secs(120);

/// Outcome of one non-blocking read of a worker's status stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusRead {
    /// A chunk of status output was available.
    Data(Vec<u8>),
    /// Nothing to read right now.
    Pending,
    /// The stream is exhausted; the process has closed its end.
    Eof,
}

/// The process-facing side of a worker.
///
/// Everything a worker needs from its external copy process: {request a
/// progress dump, read the status stream without blocking, check liveness,
/// terminate}. Implemented by [`DdHandle`] for real runs and by scripted
/// fakes in tests.
pub trait WorkerHandle {
    /// Asks the process to dump a progress line to its status stream.
    /// A no-op when the process is no longer running.
    fn request_progress(&mut self) -> Result<()>;

    /// Reads a bounded chunk from the status stream without blocking.
    fn read_status(&mut self) -> Result<StatusRead>;

    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool;

    /// Kills the process and reaps it.
    fn terminate(&mut self) -> Result<()>;
}

/// A [`WorkerHandle`] backed by a spawned `dd` process.
pub struct DdHandle {
    child: Child,
    stderr: ChildStderr,
}

impl DdHandle {
    /// Spawns `dd` copying the given block range of the device onto itself.
    ///
    /// stdin and stdout are discarded; stderr carries the signal-triggered
    /// status dumps and is switched to non-blocking reads.
    pub fn spawn(device: &Path, span: &Span) -> Result<Self> {
        let mut child = Command::new("dd")
            .arg(format!("if={}", device.display()))
            .arg(format!("of={}", device.display()))
            .arg("bs=1M")
            .arg(format!("skip={}", span.start_blocks))
            .arg(format!("seek={}", span.start_blocks))
            .arg(format!("count={}", span.len_blocks))
            .arg("conv=notrunc")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn dd for {}", device.display()))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("dd stderr was not captured"))?;
        set_nonblocking(&stderr)?;

        Ok(DdHandle { child, stderr })
    }
}

fn set_nonblocking(stderr: &ChildStderr) -> Result<()> {
    let flags = fcntl(stderr, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(stderr, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

impl WorkerHandle for DdHandle {
    fn request_progress(&mut self) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }

        let pid = Pid::from_raw(self.child.id() as i32);
        match kill(pid, Signal::SIGUSR1) {
            // The process exited between the liveness check and the signal.
            Err(Errno::ESRCH) => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    fn read_status(&mut self) -> Result<StatusRead> {
        let mut buf = [0u8; READ_CHUNK];
        match self.stderr.read(&mut buf) {
            Ok(0) => Ok(StatusRead::Eof),
            Ok(n) => Ok(StatusRead::Data(buf[..n].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(StatusRead::Pending),
            Err(e) => Err(e.into()),
        }
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) -> Result<()> {
        self.child.kill().ok();
        self.child.wait()?;
        Ok(())
    }
}

/// Supervision state for one spawned copy process.
///
/// All numeric fields start at zero and are mutated only by
/// [`Worker::update_status`].
pub struct Worker {
    handle: Box<dyn WorkerHandle>,
    bytes_completed: u64,
    rate: u64,
    last_update: Option<Instant>,
    eof_reached: bool,
}

impl Worker {
    pub fn new(handle: Box<dyn WorkerHandle>) -> Self {
        Worker {
            handle,
            bytes_completed: 0,
            rate: 0,
            last_update: None,
            eof_reached: false,
        }
    }

    /// Total bytes the worker has reported as copied.
    pub fn bytes_completed(&self) -> u64 {
        self.bytes_completed
    }

    /// Most recent instantaneous rate sample, in bytes per second.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Requests a progress dump and folds any fresh status line into the
    /// worker's stats.
    ///
    /// An empty pipe or an unparseable line leaves all fields untouched; a
    /// drained stream only records EOF. Called once per supervision tick.
    pub fn update_status(&mut self) -> Result<()> {
        self.handle.request_progress()?;

        thread::sleep(SIGNAL_FLUSH_DELAY);

        let chunk = match self.handle.read_status()? {
            StatusRead::Pending => return Ok(()),
            StatusRead::Eof => {
                self.eof_reached = true;
                return Ok(());
            }
            StatusRead::Data(chunk) => chunk,
        };

        let text = String::from_utf8_lossy(&chunk);
        let Some(most_recent) = text.lines().last() else {
            return Ok(());
        };

        if let Some(progress) = status::parse_progress_line(most_recent) {
            self.bytes_completed = progress.bytes_copied;
            self.rate = progress.rate;
            self.last_update = Some(Instant::now());
        }

        Ok(())
    }

    /// A worker is complete once its process has exited and its status
    /// stream has been drained to EOF. A dead process with unread buffered
    /// status output is not yet complete.
    pub fn complete(&mut self) -> bool {
        !self.handle.is_alive() && self.eof_reached
    }

    /// Whether the last successful status parse is recent enough to trust.
    /// False until the first parse ever succeeds.
    pub fn up_to_date(&self) -> bool {
        self.up_to_date_at(Instant::now())
    }

    fn up_to_date_at(&self, now: Instant) -> bool {
        match self.last_update {
            None => false,
            Some(at) => now.duration_since(at) < STALE_AFTER,
        }
    }

    /// Kills the underlying process, used when the run is cancelled.
    pub fn terminate(&mut self) -> Result<()> {
        self.handle.terminate()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedHandle;
    use super::*;
    use pretty_assertions::assert_eq;

    fn worker(reads: Vec<StatusRead>) -> Worker {
        Worker::new(Box::new(ScriptedHandle::new(reads)))
    }

    #[test]
    fn starts_with_zeroed_stats() {
        let worker = worker(vec![]);

        assert_eq!(worker.bytes_completed(), 0);
        assert_eq!(worker.rate(), 0);
        assert!(!worker.up_to_date())
    }

    #[test]
    fn a_parsed_status_line_updates_the_stats() {
        let mut worker = worker(vec![ScriptedHandle::line(
            "1048576 bytes (1.0 MB, 1.0 MiB) copied, 2.5 s, 419 kB/s",
        )]);

        worker.update_status().unwrap();

        assert_eq!(worker.bytes_completed(), 1048576);
        assert_eq!(worker.rate(), 419_000);
        assert!(worker.up_to_date())
    }

    #[test]
    fn only_the_last_line_of_a_chunk_is_parsed() {
        let chunk = StatusRead::Data(
            b"512 bytes copied, 1.0 s, 512 B/s\n2048 bytes copied, 2.0 s, 1 kB/s\n".to_vec(),
        );
        let mut worker = worker(vec![chunk]);

        worker.update_status().unwrap();

        assert_eq!(worker.bytes_completed(), 2048);
        assert_eq!(worker.rate(), 1000)
    }

    #[test]
    fn a_pending_read_leaves_the_stats_unchanged() {
        let mut worker = worker(vec![
            ScriptedHandle::line("2048 bytes copied, 2.0 s, 1 kB/s"),
            StatusRead::Pending,
        ]);

        worker.update_status().unwrap();
        let before = (worker.bytes_completed(), worker.rate(), worker.last_update);

        worker.update_status().unwrap();

        assert_eq!((worker.bytes_completed(), worker.rate(), worker.last_update), before)
    }

    #[test]
    fn an_unparseable_line_is_a_no_op() {
        let mut worker = worker(vec![ScriptedHandle::line("dd: fsync failed")]);

        worker.update_status().unwrap();

        assert_eq!(worker.bytes_completed(), 0);
        assert_eq!(worker.rate(), 0);
        assert!(!worker.up_to_date())
    }

    #[test]
    fn eof_alone_does_not_complete_a_live_process() {
        struct EofButAlive;
        impl WorkerHandle for EofButAlive {
            fn request_progress(&mut self) -> Result<()> {
                Ok(())
            }
            fn read_status(&mut self) -> Result<StatusRead> {
                Ok(StatusRead::Eof)
            }
            fn is_alive(&mut self) -> bool {
                true
            }
            fn terminate(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut worker = Worker::new(Box::new(EofButAlive));
        worker.update_status().unwrap();

        assert!(!worker.complete())
    }

    #[test]
    fn a_dead_process_with_an_undrained_stream_is_not_complete() {
        struct DeadButBuffered;
        impl WorkerHandle for DeadButBuffered {
            fn request_progress(&mut self) -> Result<()> {
                Ok(())
            }
            fn read_status(&mut self) -> Result<StatusRead> {
                Ok(StatusRead::Pending)
            }
            fn is_alive(&mut self) -> bool {
                false
            }
            fn terminate(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let mut worker = Worker::new(Box::new(DeadButBuffered));
        worker.update_status().unwrap();

        assert!(!worker.complete())
    }

    #[test]
    fn complete_once_dead_and_drained() {
        let mut worker = worker(vec![StatusRead::Eof]);
        assert!(!worker.complete());

        worker.update_status().unwrap();

        assert!(worker.complete())
    }

    #[test]
    fn goes_stale_two_minutes_after_the_last_parse() {
        let mut worker = worker(vec![ScriptedHandle::line(
            "2048 bytes copied, 2.0 s, 1 kB/s",
        )]);
        worker.update_status().unwrap();

        let updated_at = worker.last_update.unwrap();
        assert!(worker.up_to_date_at(updated_at + Duration::from_secs(119)));
        assert!(!worker.up_to_date_at(updated_at + Duration::from_secs(120)));
        assert!(!worker.up_to_date_at(updated_at + Duration::from_secs(121)))
    }
}
