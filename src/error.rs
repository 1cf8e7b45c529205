//! Error types for the process and file table core.
//!
//! Every table operation reports failure through a return value; no
//! operation corrupts state on failure. Resource exhaustion is always an
//! error returned to the caller, never a kernel panic.

use core::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// POSIX errno values, kept numerically compatible with the usual tables.
pub mod errno {
    /// Operation not permitted
    pub const EPERM: i32 = 1;
    /// No such file or directory
    pub const ENOENT: i32 = 2;
    /// No such process
    pub const ESRCH: i32 = 3;
    /// I/O error
    pub const EIO: i32 = 5;
    /// Bad file descriptor
    pub const EBADF: i32 = 9;
    /// No child processes
    pub const ECHILD: i32 = 10;
    /// Try again
    pub const EAGAIN: i32 = 11;
    /// Out of memory
    pub const ENOMEM: i32 = 12;
    /// Bad address
    pub const EFAULT: i32 = 14;
    /// Invalid argument
    pub const EINVAL: i32 = 22;
    /// System-wide file table overflow
    pub const ENFILE: i32 = 23;
    /// Too many open files in one process
    pub const EMFILE: i32 = 24;
    /// No space left on device
    pub const ENOSPC: i32 = 28;
    /// Illegal seek
    pub const ESPIPE: i32 = 29;
    /// Too many processes
    pub const ENPROC: i32 = 63;
}

/// Failures surfaced by the process registry, descriptor tables, and file
/// table. Grouped by the taxonomy: exhaustion, invalid reference, invalid
/// argument, relationship violation, access-mode violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Process table has no free pid in the valid range.
    ProcessTableFull,
    /// The calling process already has the maximum number of live children.
    TooManyChildren,
    /// System-wide open file table is full.
    FileTableFull,
    /// The per-process descriptor table is full.
    DescriptorTableFull,
    /// No process with the given pid.
    NoSuchProcess,
    /// Descriptor is out of range or not allocated.
    BadDescriptor,
    /// Waiting on a process that is not a child of the caller.
    NotChild,
    /// Unsupported option bits passed to waitpid.
    UnsupportedOption,
    /// Unknown whence value passed to lseek.
    UnsupportedWhence,
    /// Seek would produce a negative offset.
    InvalidOffset,
    /// Path rejected by the file-object provider.
    InvalidPath,
    /// Reading a write-only handle or writing a read-only one.
    WrongAccessMode,
    /// The underlying object does not support seeking.
    NotSeekable,
    /// User pointer rejected by the copyin/copyout layer.
    BadAddress,
    /// Generic slot-table misuse (sentinel index, out of range, occupied).
    InvalidSlot,
    /// Key lookup matched nothing.
    NotFound,
    /// I/O failure reported by the underlying file object.
    Io,
}

impl Error {
    /// Map to the errno the syscall boundary reports to userspace.
    pub fn errno(&self) -> i32 {
        match self {
            Error::ProcessTableFull => errno::ENPROC,
            Error::TooManyChildren => errno::EAGAIN,
            Error::FileTableFull => errno::ENFILE,
            Error::DescriptorTableFull => errno::EMFILE,
            Error::NoSuchProcess => errno::ESRCH,
            Error::BadDescriptor => errno::EBADF,
            Error::NotChild => errno::ECHILD,
            Error::UnsupportedOption => errno::EINVAL,
            Error::UnsupportedWhence => errno::EINVAL,
            Error::InvalidOffset => errno::EINVAL,
            Error::InvalidPath => errno::ENOENT,
            Error::WrongAccessMode => errno::EBADF,
            Error::NotSeekable => errno::ESPIPE,
            Error::BadAddress => errno::EFAULT,
            Error::InvalidSlot => errno::EINVAL,
            Error::NotFound => errno::ENOENT,
            Error::Io => errno::EIO,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ProcessTableFull => write!(f, "process table full"),
            Error::TooManyChildren => write!(f, "too many children"),
            Error::FileTableFull => write!(f, "system file table full"),
            Error::DescriptorTableFull => write!(f, "descriptor table full"),
            Error::NoSuchProcess => write!(f, "no such process"),
            Error::BadDescriptor => write!(f, "bad file descriptor"),
            Error::NotChild => write!(f, "not a child of the caller"),
            Error::UnsupportedOption => write!(f, "unsupported wait option"),
            Error::UnsupportedWhence => write!(f, "unsupported seek origin"),
            Error::InvalidOffset => write!(f, "invalid resulting offset"),
            Error::InvalidPath => write!(f, "invalid path"),
            Error::WrongAccessMode => write!(f, "wrong access mode"),
            Error::NotSeekable => write!(f, "object is not seekable"),
            Error::BadAddress => write!(f, "bad user address"),
            Error::InvalidSlot => write!(f, "invalid table slot"),
            Error::NotFound => write!(f, "no matching entry"),
            Error::Io => write!(f, "i/o error"),
        }
    }
}
