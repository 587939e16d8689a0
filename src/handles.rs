//! Fixed-capacity handle table owning all live files.
//!
//! Handles are small integers allocated smallest-free-first, like file
//! descriptors. The live count is the leak oracle external drivers assert on
//! at the end of every fuzz iteration.

use serde::{Deserialize, Serialize};

use crate::error::SysError;
use crate::file::File;

/// Maximum number of simultaneously live handles.
pub const MAX_HANDLES: usize = 1000;

/// Small integer handle identifying a live mock file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fd(u32);

impl Fd {
    #[inline(always)]
    pub fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense arena mapping handles to files.
///
/// At most one live file is associated with a handle at any time; a handle
/// without a file is free and eligible for reuse.
pub struct HandleTable {
    slots: Vec<Option<File>>,
    live: u32,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_HANDLES).map(|_| None).collect(),
            live: 0,
        }
    }

    /// Smallest free handle, or `TooManyFiles` when every slot is occupied.
    ///
    /// O(capacity) scan; determinism matters here, throughput does not.
    pub fn allocate(&self) -> Result<Fd, SysError> {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.is_none() {
                return Ok(Fd(idx as u32));
            }
        }
        Err(SysError::TooManyFiles)
    }

    /// Associate `file` with a free handle, resetting its poll linkage.
    pub fn bind(&mut self, fd: Fd, mut file: File) {
        debug_assert!(self.slots[fd.index()].is_none());
        file.link = None;
        self.slots[fd.index()] = Some(file);
        self.live += 1;
    }

    /// Allocate-and-bind in one step.
    pub fn insert(&mut self, file: File) -> Result<Fd, SysError> {
        let fd = self.allocate()?;
        self.bind(fd, file);
        Ok(fd)
    }

    /// Bounds-checked lookup; `None` for out-of-range or unbound handles.
    #[inline(always)]
    pub fn lookup(&self, fd: Fd) -> Option<&File> {
        self.slots.get(fd.index())?.as_ref()
    }

    #[inline(always)]
    pub fn lookup_mut(&mut self, fd: Fd) -> Option<&mut File> {
        self.slots.get_mut(fd.index())?.as_mut()
    }

    /// Release a bound handle, returning its file.
    pub fn release(&mut self, fd: Fd) -> Result<File, SysError> {
        let slot = self
            .slots
            .get_mut(fd.index())
            .ok_or(SysError::BadHandle)?;
        let file = slot.take().ok_or(SysError::BadHandle)?;
        self.live -= 1;
        Ok(file)
    }

    /// Count of live handles; must be zero at iteration end.
    #[inline(always)]
    pub fn live_handles(&self) -> u32 {
        self.live
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
