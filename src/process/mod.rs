//! Process management: control blocks, the pid registry, and the
//! lifecycle syscall surface.

pub mod manager;
pub mod registry;

pub use manager::{exit, fork, getpid, waitpid, CHILDREN_MAX, WNOHANG};
pub use registry::{Pid, Process, ProcessRegistry, KERNEL_PID, PID_MAX, PID_MIN};
