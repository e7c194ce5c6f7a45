use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

/// Threshold in bytes above which we map dump files instead of reading them.
/// Callers can override via API; this is a reasonable default.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

/// Raw contents of an input file, either mapped or read into memory.
pub enum DumpBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for DumpBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DumpBytes::Mapped(m) => m,
            DumpBytes::Owned(v) => v,
        }
    }
}

/// Decide whether to use mmap based on file size and threshold.
pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

/// Read a whole file into memory.
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<DumpBytes> {
    let bytes =
        std::fs::read(&path).with_context(|| format!("read {}", path.as_ref().display()))?;
    Ok(DumpBytes::Owned(bytes))
}

/// Map a file read-only. The mapping stays valid as long as nobody truncates
/// the dump while it is being parsed.
pub fn map_bytes<P: AsRef<Path>>(path: P) -> Result<DumpBytes> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    let mmap =
        unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.as_ref().display()))?;
    Ok(DumpBytes::Mapped(mmap))
}

/// Choose mmap or a plain read depending on the file size.
pub fn read_bytes_auto<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<DumpBytes> {
    let meta =
        std::fs::metadata(&path).with_context(|| format!("stat {}", path.as_ref().display()))?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        log::debug!("mapping {} ({} bytes)", path.as_ref().display(), meta.len());
        map_bytes(path)
    } else {
        read_bytes(path)
    }
}

/// Case-insensitive substring test for an already lower-cased haystack.
pub fn contains_folded(haystack_lower: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_lowercase();
    memchr::memmem::find(haystack_lower.as_bytes(), needle.as_bytes()).is_some()
}
