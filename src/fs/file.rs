//! File handles and the system-wide open file table.
//!
//! A [`FileHandle`] describes one open file: the opaque underlying object,
//! the current offset, a cached size, the access mode, and a reference
//! count. Handles are shared by index across per-process descriptor tables
//! (fork, dup2) and die exactly when the last reference is dropped.
//!
//! Table locks cover index bookkeeping only. I/O runs on a cloned handle
//! with every table lock released; the handle's own lock is taken just to
//! read or update the offset and size cache.

extern crate alloc;

use alloc::sync::Arc;
use core::fmt;

use bitflags::bitflags;
use spin::Mutex;

use crate::error::{Error, Result};
use crate::fs::fd::{FdEntry, NOFILE};
use crate::process::Process;
use crate::table::{SlotTable, TableItem};
use crate::Kernel;

/// Maximum open files system-wide.
pub const NFILE: usize = 100;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

bitflags! {
    /// Open flags, numerically compatible with the usual POSIX values.
    /// The low two bits select the access mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: i32 {
        const WRONLY = 1;
        const RDWR = 2;
        const CREAT = 0o100;
        const EXCL = 0o200;
        const TRUNC = 0o1000;
        const APPEND = 0o2000;
    }
}

const ACCMODE: i32 = 3;

/// Access mode of an open handle, fixed at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn from_flags(flags: OpenFlags) -> Result<Self> {
        match flags.bits() & ACCMODE {
            0 => Ok(AccessMode::ReadOnly),
            1 => Ok(AccessMode::WriteOnly),
            2 => Ok(AccessMode::ReadWrite),
            _ => Err(Error::UnsupportedOption),
        }
    }

    pub fn readable(&self) -> bool {
        !matches!(self, AccessMode::WriteOnly)
    }

    pub fn writable(&self) -> bool {
        !matches!(self, AccessMode::ReadOnly)
    }
}

/// Underlying file object, the vnode-equivalent collaborator. The core
/// never interprets its contents; it only moves bytes and asks for sizes.
pub trait FileObject: Send + Sync {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize>;
    fn size(&self) -> u64;
    fn is_seekable(&self) -> bool {
        true
    }
}

/// Path resolution collaborator used by `open`.
pub trait Vfs: Send + Sync {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Arc<dyn FileObject>>;
}

/// Byte sink/source behind the standard stream placeholders.
pub trait Console: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> usize;
    fn write(&self, buf: &[u8]) -> usize;
}

/// Mutable handle state, guarded by the per-handle lock.
struct HandleState {
    offset: u64,
    /// Size cache, refreshed after writes.
    size: u64,
    /// Descriptor-table references to this handle (fork, dup2).
    refs: usize,
}

/// One open file record.
pub struct FileHandle {
    object: Arc<dyn FileObject>,
    mode: AccessMode,
    state: Mutex<HandleState>,
}

impl FileHandle {
    fn new(object: Arc<dyn FileObject>, mode: AccessMode) -> Self {
        let size = object.size();
        Self {
            object,
            mode,
            state: Mutex::new(HandleState {
                offset: 0,
                size,
                refs: 1,
            }),
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn offset(&self) -> u64 {
        self.state.lock().offset
    }

    pub fn refs(&self) -> usize {
        self.state.lock().refs
    }

    /// Address of the underlying object; the lookup key shared by every
    /// handle opened on the same object.
    fn object_addr(&self) -> usize {
        Arc::as_ptr(&self.object) as *const u8 as usize
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FileHandle")
            .field("object", &self.object_addr())
            .field("mode", &self.mode)
            .field("offset", &state.offset)
            .field("size", &state.size)
            .field("refs", &state.refs)
            .finish()
    }
}

impl TableItem for Arc<FileHandle> {
    type Key = usize;

    fn key(&self) -> usize {
        self.object_addr()
    }
}

/// The single system-wide open file table, created at bootstrap and never
/// torn down during normal operation.
pub struct SystemFileTable {
    table: Mutex<SlotTable<Arc<FileHandle>>>,
}

impl SystemFileTable {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(SlotTable::new(NFILE)),
        }
    }

    /// Insert a fresh handle (refcount 1) and return its index.
    pub fn insert(&self, object: Arc<dyn FileObject>, mode: AccessMode) -> Result<usize> {
        let handle = Arc::new(FileHandle::new(object, mode));
        self.table
            .lock()
            .add(handle)
            .ok_or(Error::FileTableFull)
    }

    /// Clone out the handle at `index` so I/O can run unlocked.
    pub fn get(&self, index: usize) -> Option<Arc<FileHandle>> {
        self.table.lock().get(index).cloned()
    }

    /// Share the handle at `index`: bump its refcount, reuse the index.
    pub fn dup(&self, index: usize) -> Result<usize> {
        let table = self.table.lock();
        let handle = table.get(index).ok_or(Error::BadDescriptor)?;
        handle.state.lock().refs += 1;
        Ok(index)
    }

    /// Drop one reference to the handle at `index`. The last reference
    /// frees the slot and releases the underlying object.
    pub fn close(&self, index: usize) -> Result<()> {
        let mut table = self.table.lock();
        let handle = table.get(index).ok_or(Error::BadDescriptor)?.clone();
        let remaining = {
            let mut state = handle.state.lock();
            state.refs -= 1;
            state.refs
        };
        if remaining == 0 {
            table.remove(index)?;
        }
        Ok(())
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Indices of every handle opened on the given underlying object.
    pub fn find_by_object(&self, object: &Arc<dyn FileObject>) -> alloc::vec::Vec<usize> {
        let key = Arc::as_ptr(object) as *const u8 as usize;
        self.table.lock().find_by_key(&key)
    }
}

impl Default for SystemFileTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// File syscall surface
// ============================================================================

/// Open `path` and install a descriptor for the calling process.
///
/// A full system table reports `FileTableFull` (ENFILE); a full descriptor
/// table reports `DescriptorTableFull` (EMFILE) after releasing the system
/// entry again.
pub fn open(k: &Kernel, cur: &Process, path: &str, flags: OpenFlags, mode: u32) -> Result<usize> {
    if path.is_empty() {
        return Err(Error::InvalidPath);
    }
    let access = AccessMode::from_flags(flags)?;
    let object = k.vfs().open(path, flags, mode)?;

    let index = k.files().insert(object, access)?;
    match cur.fds().lock().add(index) {
        Ok(fd) => {
            log::debug!("open: pid {} fd {} -> file {}", cur.pid(), fd, index);
            Ok(fd)
        }
        Err(e) => {
            // No free descriptor; give the system entry back.
            let _ = k.files().close(index);
            Err(e)
        }
    }
}

/// Close a descriptor, dropping one reference to its handle.
pub fn close(k: &Kernel, cur: &Process, fd: usize) -> Result<()> {
    let entry = cur.fds().lock().remove(fd)?;
    if let FdEntry::File(index) = entry {
        k.files().close(index)?;
    }
    Ok(())
}

/// Read from a descriptor. Standard-stream placeholders read from the
/// console collaborator; file handles read at the shared offset.
pub fn read(k: &Kernel, cur: &Process, fd: usize, buf: &mut [u8]) -> Result<usize> {
    let index = match cur.fds().lock().get(fd) {
        Some(FdEntry::Console) => return Ok(k.console().read(buf)),
        Some(FdEntry::File(index)) => index,
        None => return Err(Error::BadDescriptor),
    };
    let handle = k.files().get(index).ok_or(Error::BadDescriptor)?;
    if !handle.mode.readable() {
        return Err(Error::WrongAccessMode);
    }

    let offset = handle.state.lock().offset;
    // The object call runs with no lock held; it may block.
    let n = handle.object.read_at(offset, buf)?;
    handle.state.lock().offset = offset + n as u64;
    Ok(n)
}

/// Write to a descriptor, refreshing the handle's size cache afterwards.
pub fn write(k: &Kernel, cur: &Process, fd: usize, buf: &[u8]) -> Result<usize> {
    let index = match cur.fds().lock().get(fd) {
        Some(FdEntry::Console) => return Ok(k.console().write(buf)),
        Some(FdEntry::File(index)) => index,
        None => return Err(Error::BadDescriptor),
    };
    let handle = k.files().get(index).ok_or(Error::BadDescriptor)?;
    if !handle.mode.writable() {
        return Err(Error::WrongAccessMode);
    }

    let offset = handle.state.lock().offset;
    let n = handle.object.write_at(offset, buf)?;
    let size = handle.object.size();
    {
        let mut state = handle.state.lock();
        state.offset = offset + n as u64;
        state.size = size;
    }
    Ok(n)
}

/// Reposition a descriptor's offset. Console placeholders and
/// non-seekable objects report `NotSeekable`.
pub fn lseek(k: &Kernel, cur: &Process, fd: usize, offset: i64, whence: i32) -> Result<i64> {
    let index = match cur.fds().lock().get(fd) {
        Some(FdEntry::Console) => return Err(Error::NotSeekable),
        Some(FdEntry::File(index)) => index,
        None => return Err(Error::BadDescriptor),
    };
    let handle = k.files().get(index).ok_or(Error::BadDescriptor)?;
    if !handle.object.is_seekable() {
        return Err(Error::NotSeekable);
    }

    let mut state = handle.state.lock();
    let new_offset = match whence {
        SEEK_SET => offset,
        SEEK_CUR => state.offset as i64 + offset,
        SEEK_END => state.size as i64 + offset,
        _ => return Err(Error::UnsupportedWhence),
    };
    if new_offset < 0 {
        return Err(Error::InvalidOffset);
    }
    state.offset = new_offset as u64;
    Ok(new_offset)
}

/// Duplicate `oldfd` onto `newfd` with shared offset and shared refcount:
/// both descriptors name the same system-table entry afterwards. An
/// occupied `newfd` is closed first.
pub fn dup2(k: &Kernel, cur: &Process, oldfd: usize, newfd: usize) -> Result<usize> {
    if oldfd == newfd || newfd == 0 || newfd > NOFILE {
        return Err(Error::BadDescriptor);
    }
    // One descriptor-lock window: resolving oldfd, retiring newfd, and
    // installing the duplicate must not interleave with a sibling
    // thread's close or open. The refcount bump happens before newfd's
    // old entry is touched, so a failure leaves newfd intact.
    let mut fds = cur.fds().lock();
    let index = match fds.get(oldfd) {
        Some(FdEntry::File(index)) => index,
        _ => return Err(Error::BadDescriptor),
    };
    let index = k.files().dup(index)?;
    if let Ok(FdEntry::File(old_index)) = fds.remove(newfd) {
        let _ = k.files().close(old_index);
    }
    fds.set_at(newfd, FdEntry::File(index))?;
    log::debug!("dup2: pid {} {} -> {}", cur.pid(), oldfd, newfd);
    Ok(newfd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct FixedFile {
        data: Mutex<alloc::vec::Vec<u8>>,
        seekable: bool,
    }

    impl FixedFile {
        fn new(data: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                data: Mutex::new(data.to_vec()),
                seekable: true,
            })
        }
    }

    impl FileObject for FixedFile {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let data = self.data.lock();
            let start = (offset as usize).min(data.len());
            let n = buf.len().min(data.len() - start);
            buf[..n].copy_from_slice(&data[start..start + n]);
            Ok(n)
        }

        fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
            let mut data = self.data.lock();
            let end = offset as usize + buf.len();
            if data.len() < end {
                data.resize(end, 0);
            }
            data[offset as usize..end].copy_from_slice(buf);
            Ok(buf.len())
        }

        fn size(&self) -> u64 {
            self.data.lock().len() as u64
        }

        fn is_seekable(&self) -> bool {
            self.seekable
        }
    }

    #[test]
    fn table_fills_then_reports_enfile() {
        let table = SystemFileTable::new();
        let object = FixedFile::new(b"x");
        let mut indices = vec![];
        for _ in 0..NFILE {
            let object: Arc<dyn FileObject> = object.clone();
            indices.push(table.insert(object, AccessMode::ReadOnly).unwrap());
        }
        let extra: Arc<dyn FileObject> = object.clone();
        assert_eq!(
            table.insert(extra, AccessMode::ReadOnly),
            Err(Error::FileTableFull)
        );
        assert_eq!(table.len(), NFILE);
    }

    #[test]
    fn handle_lives_until_last_reference() {
        let table = SystemFileTable::new();
        let object: Arc<dyn FileObject> = FixedFile::new(b"abc");
        let index = table.insert(object, AccessMode::ReadWrite).unwrap();

        assert_eq!(table.dup(index).unwrap(), index);
        assert_eq!(table.get(index).unwrap().refs(), 2);

        table.close(index).unwrap();
        assert!(table.get(index).is_some());
        table.close(index).unwrap();
        assert!(table.get(index).is_none());
        assert_eq!(table.close(index), Err(Error::BadDescriptor));
    }

    #[test]
    fn handles_on_same_object_share_a_key() {
        let table = SystemFileTable::new();
        let object = FixedFile::new(b"abc");
        let a: Arc<dyn FileObject> = object.clone();
        let b: Arc<dyn FileObject> = object.clone();
        let ia = table.insert(a, AccessMode::ReadOnly).unwrap();
        let ib = table.insert(b, AccessMode::WriteOnly).unwrap();
        let shared: Arc<dyn FileObject> = object;
        let found = table.find_by_object(&shared);
        assert!(found.contains(&ia));
        assert!(found.contains(&ib));
    }

    #[test]
    fn access_mode_from_flag_bits() {
        assert_eq!(
            AccessMode::from_flags(OpenFlags::empty()).unwrap(),
            AccessMode::ReadOnly
        );
        assert_eq!(
            AccessMode::from_flags(OpenFlags::WRONLY).unwrap(),
            AccessMode::WriteOnly
        );
        assert_eq!(
            AccessMode::from_flags(OpenFlags::RDWR | OpenFlags::CREAT).unwrap(),
            AccessMode::ReadWrite
        );
        assert!(AccessMode::from_flags(OpenFlags::WRONLY | OpenFlags::RDWR).is_err());
    }
}
