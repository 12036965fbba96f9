//! Error types for argument validation and signal delivery

use nix::errno::Errno;
use thiserror::Error;

use crate::table::Pid;

/// Malformed invocation. Raised before any process table access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Incorrect number of arguments (expected 2 or 3, got {0})")]
    ArgumentCount(usize),

    #[error("root_process must be a number, got {0:?}")]
    RootNotNumeric(String),

    #[error("process_id must be a number, got {0:?}")]
    PidNotNumeric(String),

    #[error("{0} is too large to be a process id")]
    OutOfRange(String),

    #[error("Unexpected argument {0:?} without an option")]
    UnexpectedArgument(String),
}

/// Failure to deliver one signal to one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("process {0} no longer exists")]
    Gone(Pid),

    #[error("permission denied signalling process {0}")]
    PermissionDenied(Pid),

    #[error("{0} cannot be addressed as a single process")]
    InvalidPid(Pid),

    #[error("failed to signal process {pid}: {errno}")]
    Os { pid: Pid, errno: Errno },
}

impl DeliveryError {
    pub fn from_errno(pid: Pid, errno: Errno) -> Self {
        match errno {
            Errno::ESRCH => DeliveryError::Gone(pid),
            Errno::EPERM => DeliveryError::PermissionDenied(pid),
            errno => DeliveryError::Os { pid, errno },
        }
    }
}

/// A dispatch request refused before any signal was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("The process {pid} does not belong to the tree rooted at {root}")]
    NotInTree { root: Pid, pid: Pid },
}
