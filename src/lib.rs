//! Process and open-file core of a teaching kernel.
//!
//! The crate owns three tables and the syscall-level operations over them:
//! the pid-indexed process registry, the system-wide open file table, and
//! one descriptor table per process. Storage, scheduling, and the actual
//! file systems live elsewhere; they plug in through the [`fs::Vfs`] and
//! [`fs::Console`] traits.
//!
//! Everything is `no_std` + `alloc`. Resource exhaustion in any table is
//! reported to the caller as an error; nothing here panics on a full
//! table.

#![no_std]

extern crate alloc;

pub mod error;
pub mod fs;
pub mod process;
pub mod sync;
pub mod table;

pub use error::{Error, Result};

use alloc::sync::Arc;

use fs::{Console, SystemFileTable, Vfs};
use process::{Process, ProcessRegistry, KERNEL_PID};

/// Shared kernel state threaded through every syscall-level operation.
///
/// Built once at bootstrap with the platform's path-resolution and console
/// collaborators; pid 1 is created here and never exits.
pub struct Kernel {
    registry: ProcessRegistry,
    files: SystemFileTable,
    vfs: Arc<dyn Vfs>,
    console: Arc<dyn Console>,
    kproc: Arc<Process>,
}

impl Kernel {
    pub fn new(vfs: Arc<dyn Vfs>, console: Arc<dyn Console>) -> Result<Self> {
        let registry = ProcessRegistry::new();
        let kproc = Arc::new(Process::new(KERNEL_PID, "[kernel]", KERNEL_PID)?);
        registry.install_kernel(kproc.clone())?;
        log::info!("kernel process registered as pid {}", KERNEL_PID);
        Ok(Self {
            registry,
            files: SystemFileTable::new(),
            vfs,
            console,
            kproc,
        })
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn files(&self) -> &SystemFileTable {
        &self.files
    }

    pub fn vfs(&self) -> &dyn Vfs {
        self.vfs.as_ref()
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    /// The bootstrap process, parent of every first-generation fork.
    pub fn kernel_process(&self) -> &Arc<Process> {
        &self.kproc
    }
}
