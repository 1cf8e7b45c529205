//! Process lifecycle: fork, exit, waitpid, getpid.
//!
//! Locking discipline: at most one process's inner lock is held at a time.
//! Lifecycle operations gather what they need under one lock, release it,
//! then take the next. The exit/wait rendezvous never holds a lock while
//! blocking.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use crate::error::{Error, Result};
use crate::process::registry::{Pid, Process};
use crate::Kernel;

/// Maximum live children per process.
pub const CHILDREN_MAX: usize = 16;

/// waitpid option: report instead of block when the child is still running.
pub const WNOHANG: i32 = 1;

/// Pid of the calling process. Cannot fail.
pub fn getpid(cur: &Process) -> Pid {
    cur.pid()
}

/// Create a child of the calling process.
///
/// The child gets a fresh pid, a copy of the parent's descriptor table
/// with every shared file handle's reference count bumped, and a seat in
/// the parent's children list. Any failure unwinds completely: duplicated
/// handle references are released and the pid is returned to the registry.
pub fn fork(k: &Kernel, cur: &Process, name: &str) -> Result<Arc<Process>> {
    let child = k.registry().allocate(name, cur.pid())?;

    // The snapshot and the refcount bumps happen under the parent's
    // descriptor lock, so a sibling thread's close/open cannot free and
    // reuse an index between the two.
    let mut duped: Vec<usize> = Vec::new();
    let fds = {
        let parent_fds = cur.fds().lock();
        for index in parent_fds.file_indices() {
            match k.files().dup(index) {
                Ok(_) => duped.push(index),
                Err(e) => {
                    drop(parent_fds);
                    unwind_fork(k, child.pid(), &duped);
                    return Err(e);
                }
            }
        }
        parent_fds.duplicate()
    };
    *child.fds().lock() = fds;

    {
        let mut inner = cur.inner.lock();
        if inner.children.len() >= CHILDREN_MAX {
            drop(inner);
            unwind_fork(k, child.pid(), &duped);
            return Err(Error::TooManyChildren);
        }
        inner.children.push(child.pid());
    }

    log::info!("fork: pid {} -> child {} ({})", cur.pid(), child.pid(), name);
    Ok(child)
}

fn unwind_fork(k: &Kernel, child_pid: Pid, duped: &[usize]) {
    for &index in duped {
        let _ = k.files().close(index);
    }
    k.registry().remove(child_pid);
}

/// Terminate the calling process with the low eight bits of `status`.
///
/// Live children are marked orphans so they reap themselves later. A
/// process whose parent already exited reaps itself here; otherwise it
/// parks its status and signals the rendezvous semaphore for a waiter.
pub fn exit(k: &Kernel, cur: &Process, status: i32) {
    let (parent, children, orphan) = {
        let mut inner = cur.inner.lock();
        inner.status = status & 0xff;
        (inner.parent, mem::take(&mut inner.children), inner.orphan)
    };
    cur.set_exited();

    if !orphan {
        if let Some(p) = k.registry().lookup(parent) {
            let pid = cur.pid();
            p.inner.lock().children.retain(|&c| c != pid);
        }
    }
    for child_pid in children {
        if let Some(child) = k.registry().lookup(child_pid) {
            child.inner.lock().orphan = true;
        }
    }

    log::info!("exit: pid {} status {}", cur.pid(), status & 0xff);
    if orphan {
        destroy(k, cur.pid());
    } else {
        cur.sem.signal();
    }
}

/// Collect a child's exit status.
///
/// Blocks until the child exits unless `WNOHANG` is given, in which case a
/// still-running child answers `None`. A collected child is unregistered
/// and its descriptor references released; its pid becomes reusable.
pub fn waitpid(
    k: &Kernel,
    cur: &Process,
    pid: Pid,
    options: i32,
) -> Result<Option<(Pid, i32)>> {
    if options != 0 && options != WNOHANG {
        return Err(Error::UnsupportedOption);
    }
    let target = k.registry().lookup(pid).ok_or(Error::NoSuchProcess)?;
    if target.inner.lock().parent != cur.pid() {
        return Err(Error::NotChild);
    }

    if !target.has_exited() {
        if options == WNOHANG {
            return Ok(None);
        }
        target.sem.wait();
    }
    // The exited flag was published with release ordering after the status
    // write, so the status read here is ordered.
    let status = target.inner.lock().status;
    destroy(k, pid);
    Ok(Some((pid, status)))
}

/// Unregister a process and release its descriptor references. The
/// registry's take semantics make this idempotent under races.
fn destroy(k: &Kernel, pid: Pid) {
    let Some(proc) = k.registry().remove(pid) else {
        return;
    };
    let indices = proc.fds().lock().file_indices();
    for index in indices {
        let _ = k.files().close(index);
    }
    log::trace!("destroy: pid {} unregistered", pid);
}
