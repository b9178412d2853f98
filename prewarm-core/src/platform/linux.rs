use anyhow::Result;
use nix::errno::Errno;
use nix::ioctl_read;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use sysinfo;

ioctl_read!(blkgetsize64, 0x12, 114, u64);

/// Queries the size of a block device in bytes.
///
/// Uses the `BLKGETSIZE64` ioctl. For regular files (e.g. loopback images
/// used in testing) the ioctl is not applicable and the file length is
/// reported instead.
pub fn device_size(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    let fd = file.as_raw_fd();

    let mut size_bytes: u64 = 0;
    match unsafe { blkgetsize64(fd, &mut size_bytes) } {
        Ok(_) => Ok(size_bytes),
        Err(Errno::ENOTTY) => Ok(file.metadata()?.len()),
        Err(e) => Err(e.into()),
    }
}

/// Checks whether a device, or any partition on it, is currently mounted.
///
/// This consults the `sysinfo` mount table and matches on the device name, so
/// `/dev/xvdf` is considered mounted when `/dev/xvdf1` is.
pub fn is_mounted(path: &Path) -> bool {
    let device_name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => return false,
    };

    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks.iter().any(|disk| {
        Path::new(disk.name())
            .file_name()
            .is_some_and(|name| names_device(&name.to_string_lossy(), &device_name))
    })
}

/// Whether a mount-table entry names the device itself or a partition on it.
/// Partitions carry a numeric suffix (`sda` -> `sda1`), with a `p` separator
/// on devices whose name ends in a digit (`nvme0n1` -> `nvme0n1p2`).
/// A sibling device sharing the prefix (`sda` vs `sdab`) does not match.
fn names_device(disk_name: &str, device_name: &str) -> bool {
    let Some(rest) = disk_name.strip_prefix(device_name) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }

    let digits = rest.strip_prefix('p').unwrap_or(rest);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_device_itself() {
        assert!(names_device("xvdf", "xvdf"))
    }

    #[test]
    fn matches_numbered_partitions() {
        assert!(names_device("sda1", "sda"));
        assert!(names_device("xvdf12", "xvdf"))
    }

    #[test]
    fn matches_p_separated_partitions() {
        assert!(names_device("nvme0n1p2", "nvme0n1"));
        assert!(names_device("mmcblk0p1", "mmcblk0"))
    }

    #[test]
    fn rejects_a_sibling_device_sharing_the_prefix() {
        assert!(!names_device("sdab", "sda"));
        assert!(!names_device("sdab1", "sda"))
    }

    #[test]
    fn rejects_a_bare_p_suffix_and_unrelated_names() {
        assert!(!names_device("sdap", "sda"));
        assert!(!names_device("sdb", "sda"))
    }
}
