//! System memory backing store.
//!
//! System memory is one flat byte array filled with a recognisable pattern at
//! start-up, so every page is touched on construction. On Unix it is an
//! anonymous `mmap`; elsewhere (or if the mapping fails) it is an ordinary heap
//! allocation.

use std::fmt;
use std::slice;

use crate::common::constants::SYSTEM_MEMORY_PATTERN;
use crate::transaction::memory::masked_copy;

/// Flat system memory.
pub struct SystemMemory {
    ptr: *mut u8,
    size: usize,
    is_mmap: bool,
}

// SAFETY: the buffer is uniquely owned and only reached through `&self`/`&mut self`.
unsafe impl Send for SystemMemory {}
// SAFETY: shared access only hands out shared slices.
unsafe impl Sync for SystemMemory {}

impl SystemMemory {
    /// Allocates `size` bytes filled with the system memory pattern.
    pub fn new(size: usize) -> Self {
        let mut memory = Self::map(size).unwrap_or_else(|| Self::heap(size));
        let pattern = SYSTEM_MEMORY_PATTERN.to_le_bytes();
        for word in memory.as_mut_slice().chunks_mut(pattern.len()) {
            word.copy_from_slice(&pattern[..word.len()]);
        }
        memory
    }

    #[cfg(unix)]
    fn map(size: usize) -> Option<Self> {
        if size == 0 {
            return None;
        }
        // SAFETY: anonymous private mapping with no address hint; checked below.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            tracing::warn!(size, "system memory mmap failed, using heap allocation");
            return None;
        }
        Some(Self {
            ptr: ptr.cast::<u8>(),
            size,
            is_mmap: true,
        })
    }

    #[cfg(not(unix))]
    fn map(_size: usize) -> Option<Self> {
        None
    }

    fn heap(size: usize) -> Self {
        let boxed: Box<[u8]> = vec![0u8; size].into_boxed_slice();
        Self {
            ptr: Box::into_raw(boxed).cast::<u8>(),
            size,
            is_mmap: false,
        }
    }

    /// Size in bytes.
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Whether the memory is empty.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The whole memory.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points to `size` initialised bytes owned by `self`.
        unsafe { slice::from_raw_parts(self.ptr, self.size) }
    }

    /// The whole memory, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    /// Bytes `[offset, offset + len)`, or `None` past the end.
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.as_slice().get(offset..offset.checked_add(len)?)
    }

    /// Copies `data` to `offset`, optionally under a word mask.
    ///
    /// # Returns
    ///
    /// `false` (and no change) when the range is past the end.
    pub fn write(&mut self, offset: usize, data: &[u8], mask: Option<&[u32]>) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        let Some(dst) = self.as_mut_slice().get_mut(offset..end) else {
            return false;
        };
        match mask {
            Some(mask) => masked_copy(dst, data, mask),
            None => dst.copy_from_slice(data),
        }
        true
    }
}

impl fmt::Debug for SystemMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemMemory")
            .field("size", &self.size)
            .field("is_mmap", &self.is_mmap)
            .finish()
    }
}

impl Drop for SystemMemory {
    fn drop(&mut self) {
        if self.is_mmap {
            #[cfg(unix)]
            // SAFETY: `ptr`/`size` are exactly the mapping created in `map`.
            unsafe {
                let _ = libc::munmap(self.ptr.cast(), self.size);
            }
        } else {
            // SAFETY: `ptr`/`size` come from `Box::into_raw` in `heap`.
            unsafe {
                drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(self.ptr, self.size)));
            }
        }
    }
}
