//! Open-file management: the system-wide file table, per-process
//! descriptor tables, and the file syscall surface.

pub mod fd;
pub mod file;

pub use fd::{FdEntry, FdTable, NOFILE};
pub use file::{
    close, dup2, lseek, open, read, write, AccessMode, Console, FileHandle, FileObject, OpenFlags,
    SystemFileTable, Vfs, NFILE, SEEK_CUR, SEEK_END, SEEK_SET,
};
