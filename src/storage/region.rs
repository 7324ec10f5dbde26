//! # Memory-Mapped File Regions
//!
//! This module implements `MappedRegion`, the low-level building block for
//! the map's on-disk bucket storage. A region is a contiguous, fixed-length,
//! file-backed byte range mapped read-write into the process address space.
//!
//! ## Internal Component
//!
//! `MappedRegion` is an internal component used by `BucketArray` to manage
//! individual data files (`data.0`, `data.1`, ...). Users should not create
//! `MappedRegion` instances directly; instead use the higher-level
//! `BucketMap` API which manages the store directory automatically.
//!
//! ## Design Philosophy
//!
//! Copying bucket pages between kernel buffers and a user-space cache would
//! double the I/O cost of every probe. Memory-mapped I/O eliminates the copy
//! by mapping the file directly into the address space; the OS pages data in
//! and out transparently, using its existing page cache.
//!
//! ## Length Semantics
//!
//! Regions are opened *by length*: `open(path, len)` creates the backing
//! file if needed and sizes it to exactly `len` bytes. Re-opening an
//! existing file with the same length preserves its bytes, which is how the
//! bucket arrays survive a process restart. Regions never grow; the bucket
//! map allocates a fresh region (a new `data.i` file) when the directory
//! doubles.
//!
//! ## Access Pattern
//!
//! Bucket probes are random by construction (the whole point of hashing), so
//! the mapping is advised with `MADV_RANDOM` at creation, and individual
//! pages can be prefetched with `MADV_WILLNEED` ahead of a scan.
//!
//! ## Durability
//!
//! `sync()` blocks until the OS has written the region back (`msync` with
//! `MS_SYNC` underneath); `sync_async()` only schedules the write-back. The
//! mapping is released when the region is dropped; `destroy()` additionally
//! unlinks the backing file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

#[derive(Debug)]
pub struct MappedRegion {
    mmap: MmapMut,
    path: PathBuf,
    len: usize,
    // Kept open so the mapping outlives any external unlink of the path.
    _file: File,
}

impl MappedRegion {
    /// Creates or opens the file at `path`, sizes it to exactly `len` bytes
    /// and maps it read-write. Existing bytes are preserved on re-open.
    pub fn open<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref();

        ensure!(len > 0, "cannot map zero-length region '{}'", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .wrap_err_with(|| format!("failed to open data file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat data file '{}'", path.display()))?
            .len();

        if file_size != len as u64 {
            file.set_len(len as u64).wrap_err_with(|| {
                format!(
                    "failed to size data file '{}' to {} bytes",
                    path.display(),
                    len
                )
            })?;
        }

        // SAFETY: MmapMut::map_mut is unsafe because memory-mapped files can
        // be modified externally, leading to undefined behavior. This is safe
        // because:
        // 1. The file is opened read+write and the map contract is single
        //    writer, no external readers (store directories are private)
        // 2. The file was sized to exactly `len` before mapping, so the
        //    mapping never extends past EOF
        // 3. The mmap lifetime is tied to MappedRegion, preventing
        //    use-after-unmap
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        let region = Self {
            mmap,
            path: path.to_path_buf(),
            len,
            _file: file,
        };
        region.advise_random();

        Ok(region)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    /// Blocks until the region's dirty pages have been written back.
    pub fn sync(&self) -> Result<()> {
        self.mmap
            .flush()
            .wrap_err_with(|| format!("failed to sync region '{}'", self.path.display()))
    }

    /// Schedules a write-back of the region's dirty pages without waiting
    /// for it to complete.
    pub fn sync_async(&self) -> Result<()> {
        self.mmap
            .flush_async()
            .wrap_err_with(|| format!("failed to start async sync of '{}'", self.path.display()))
    }

    /// Unmaps the region and removes its backing file.
    pub fn destroy(self) -> Result<()> {
        let Self {
            mmap, path, _file, ..
        } = self;
        drop(mmap);
        drop(_file);
        fs::remove_file(&path)
            .wrap_err_with(|| format!("failed to remove data file '{}'", path.display()))
    }

    /// Hints the OS to fault in `count` bytes starting at `offset`, clamped
    /// to the region bounds. Advisory only.
    pub fn prefetch(&self, offset: usize, count: usize) {
        if offset >= self.len {
            return;
        }

        let len = count.min(self.len - offset);

        #[cfg(unix)]
        // SAFETY: madvise with MADV_WILLNEED is a hint to the kernel. This is
        // safe because:
        // 1. `offset` was bounds-checked above (offset >= len returns early)
        // 2. `len` is clamped so offset + len never exceeds the mapping
        // 3. The mapping is valid for the whole region length
        unsafe {
            libc::madvise(
                self.mmap.as_ptr().add(offset) as *mut libc::c_void,
                len,
                libc::MADV_WILLNEED,
            );
        }

        #[cfg(not(unix))]
        let _ = len;
    }

    fn advise_random(&self) {
        #[cfg(unix)]
        // SAFETY: madvise with MADV_RANDOM is a hint to the kernel; the
        // pointer and length describe exactly the live mapping.
        unsafe {
            libc::madvise(
                self.mmap.as_ptr() as *mut libc::c_void,
                self.len,
                libc::MADV_RANDOM,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file_of_exact_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.0");

        let region = MappedRegion::open(&path, 4096).unwrap();

        assert_eq!(region.len(), 4096);
        assert_eq!(fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn reopen_preserves_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.0");

        {
            let mut region = MappedRegion::open(&path, 1024).unwrap();
            region.as_mut_slice()[100] = 0xAB;
            region.sync().unwrap();
        }

        let region = MappedRegion::open(&path, 1024).unwrap();
        assert_eq!(region.as_slice()[100], 0xAB);
    }

    #[test]
    fn open_extends_short_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.0");
        fs::write(&path, b"abc").unwrap();

        let region = MappedRegion::open(&path, 512).unwrap();

        assert_eq!(region.len(), 512);
        assert_eq!(&region.as_slice()[..3], b"abc");
        assert_eq!(region.as_slice()[3], 0);
    }

    #[test]
    fn zero_length_region_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.0");

        assert!(MappedRegion::open(&path, 0).is_err());
    }

    #[test]
    fn destroy_removes_backing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.0");

        let region = MappedRegion::open(&path, 512).unwrap();
        region.destroy().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn prefetch_out_of_bounds_is_a_no_op() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.0");

        let region = MappedRegion::open(&path, 512).unwrap();
        region.prefetch(1024, 512);
        region.prefetch(256, 4096);
    }
}
