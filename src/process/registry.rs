//! Process control blocks and the pid-indexed registry.
//!
//! Pids are direct indices into the registry's slot array. Pid 0 is the
//! reserved "no process" sentinel, pid 1 belongs to the kernel's own
//! bootstrap process, and user processes live in `[PID_MIN, PID_MAX]`.
//! The array starts small and doubles on demand up to the pid ceiling;
//! running out of pids is an error returned to the caller, never a panic.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::error::{Error, Result};
use crate::fs::FdTable;
use crate::sync::Semaphore;

pub type Pid = usize;

/// Pid of the kernel bootstrap process.
pub const KERNEL_PID: Pid = 1;
/// Smallest pid handed to user processes.
pub const PID_MIN: Pid = 2;
/// Largest pid ever handed out.
pub const PID_MAX: Pid = 1024;

/// Registry slots allocated up front.
const INITIAL_DIM: usize = 64;

/// Mutable process state, guarded by the per-process lock.
#[derive(Debug)]
pub(crate) struct ProcessInner {
    pub(crate) parent: Pid,
    /// Pids of live children. An exiting child removes itself.
    pub(crate) children: Vec<Pid>,
    /// Set when the parent exits first; an orphan reaps itself at exit.
    pub(crate) orphan: bool,
    /// Exit status, valid once `exited` is set.
    pub(crate) status: i32,
}

/// One process control block.
///
/// The exit/wait rendezvous runs on `exited` and `sem` together: exit
/// publishes the status, sets the flag with release ordering, then signals.
/// A waiter that observes the flag may skip the semaphore entirely.
pub struct Process {
    pid: Pid,
    name: String,
    exited: AtomicBool,
    pub(crate) sem: Semaphore,
    pub(crate) inner: Mutex<ProcessInner>,
    fds: Mutex<FdTable>,
}

impl Process {
    pub(crate) fn new(pid: Pid, name: &str, parent: Pid) -> Result<Self> {
        Ok(Self {
            pid,
            name: String::from(name),
            exited: AtomicBool::new(false),
            sem: Semaphore::new(0),
            inner: Mutex::new(ProcessInner {
                parent,
                children: Vec::new(),
                orphan: false,
                status: 0,
            }),
            fds: Mutex::new(FdTable::new()?),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Pid {
        self.inner.lock().parent
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub(crate) fn set_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }

    pub fn fds(&self) -> &Mutex<FdTable> {
        &self.fds
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("exited", &self.has_exited())
            .finish()
    }
}

/// Registry slot state. `Reserved` marks a pid handed out while its
/// control block is still being built outside the lock.
#[derive(Clone)]
enum Slot {
    Free,
    Reserved,
    Live(Arc<Process>),
}

struct RegistryInner {
    slots: Vec<Slot>,
    /// Pid of the last successful allocation; probes resume after it.
    last: Pid,
}

impl RegistryInner {
    /// Circular probe over the user pid range, growing the array when no
    /// free slot exists below the current dimension.
    fn probe_free(&mut self) -> Option<Pid> {
        loop {
            let dim = self.slots.len();
            if dim > PID_MIN {
                let next = self.last + 1;
                let start = if next < PID_MIN || next >= dim {
                    PID_MIN
                } else {
                    next
                };
                let mut i = start;
                loop {
                    if matches!(self.slots[i], Slot::Free) {
                        return Some(i);
                    }
                    i += 1;
                    if i >= dim {
                        i = PID_MIN;
                    }
                    if i == start {
                        break;
                    }
                }
            }
            if dim >= PID_MAX + 1 {
                return None;
            }
            let new_dim = (dim * 2 + 1).min(PID_MAX + 1);
            self.slots.resize(new_dim, Slot::Free);
        }
    }
}

/// System-wide table of live processes, indexed by pid.
pub struct ProcessRegistry {
    inner: Mutex<RegistryInner>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                slots: vec![Slot::Free; INITIAL_DIM],
                last: KERNEL_PID,
            }),
        }
    }

    /// Place the bootstrap process at its reserved pid. Called once.
    pub fn install_kernel(&self, proc: Arc<Process>) -> Result<()> {
        let mut inner = self.inner.lock();
        if !matches!(inner.slots[KERNEL_PID], Slot::Free) {
            return Err(Error::InvalidSlot);
        }
        inner.slots[KERNEL_PID] = Slot::Live(proc);
        Ok(())
    }

    /// Allocate a pid and register a fresh process under it.
    ///
    /// The lock covers only the pid reservation and the final install;
    /// control block construction allocates and runs unlocked.
    pub fn allocate(&self, name: &str, parent: Pid) -> Result<Arc<Process>> {
        let pid = {
            let mut inner = self.inner.lock();
            let pid = inner.probe_free().ok_or(Error::ProcessTableFull)?;
            inner.slots[pid] = Slot::Reserved;
            inner.last = pid;
            pid
        };

        let proc = match Process::new(pid, name, parent) {
            Ok(proc) => Arc::new(proc),
            Err(e) => {
                self.inner.lock().slots[pid] = Slot::Free;
                return Err(e);
            }
        };
        self.inner.lock().slots[pid] = Slot::Live(proc.clone());
        log::trace!("registry: allocated pid {} ({})", pid, name);
        Ok(proc)
    }

    pub fn lookup(&self, pid: Pid) -> Option<Arc<Process>> {
        if pid == 0 {
            return None;
        }
        match self.inner.lock().slots.get(pid) {
            Some(Slot::Live(proc)) => Some(proc.clone()),
            _ => None,
        }
    }

    /// Unregister a pid, returning the process exactly once. The second
    /// caller gets `None`, which makes teardown race-free.
    pub fn remove(&self, pid: Pid) -> Option<Arc<Process>> {
        if pid == 0 {
            return None;
        }
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(pid)?;
        if matches!(slot, Slot::Live(_)) {
            if let Slot::Live(proc) = mem::replace(slot, Slot::Free) {
                return Some(proc);
            }
        }
        None
    }

    /// Number of registered processes, the kernel process included.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
