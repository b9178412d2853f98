//! Splits a device into the disjoint block ranges assigned to workers.

/// All ranges are expressed in fixed 1 MiB blocks, matching the `bs=` value
/// passed to the copy workers.
pub const BLOCK_SIZE: u64 = 1024 * 1024;

/// A contiguous range of blocks assigned to a single worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    /// First block of the range, as a block offset from the start of the device.
    pub start_blocks: u64,
    /// Number of blocks in the range.
    pub len_blocks: u64,
}

impl Span {
    /// The range's length in bytes.
    pub fn len_bytes(&self) -> u64 {
        self.len_blocks * BLOCK_SIZE
    }
}

/// Partitions a device into one [`Span`] per worker.
///
/// Each worker receives `floor(floor(device_size / BLOCK_SIZE) / worker_count)`
/// blocks, so up to `total_blocks % worker_count` trailing blocks (plus any
/// partial block at the end of the device) are assigned to no worker and are
/// never rewritten.
pub fn partition(device_size: u64, worker_count: u32) -> Vec<Span> {
    let total_blocks = device_size / BLOCK_SIZE;
    let blocks_per_worker = total_blocks / worker_count as u64;

    (0..worker_count as u64)
        .map(|i| Span {
            start_blocks: blocks_per_worker * i,
            len_blocks: blocks_per_worker,
        })
        .collect()
}
