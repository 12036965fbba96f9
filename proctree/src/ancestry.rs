//! Parent-chain walking

use std::collections::HashSet;
use tracing::debug;

use crate::table::{Pid, ProcessTable};

/// Pid of the process every chain ends at on Linux.
pub const INIT_PID: Pid = 1;

/// Decides tree membership by walking parent links toward the init process.
pub struct Ancestry<'a, T: ProcessTable> {
    table: &'a T,
    init_pid: Pid,
}

impl<'a, T: ProcessTable> Ancestry<'a, T> {
    pub fn new(table: &'a T, init_pid: Pid) -> Self {
        Self { table, init_pid }
    }

    pub fn table(&self) -> &'a T {
        self.table
    }

    /// True if `root` appears somewhere on the parent chain of `pid`.
    ///
    /// A process is never its own descendant. The walk ends with `false` at
    /// the init process, or as soon as a link cannot be read (the process
    /// exited mid-walk).
    pub fn is_descendant_of(&self, root: Pid, pid: Pid) -> bool {
        if pid == root {
            return false;
        }

        let mut current = pid;
        let mut seen = HashSet::new();
        loop {
            if current == self.init_pid {
                return false;
            }
            let Some(parent) = self.table.record(current).and_then(|r| r.parent) else {
                return false;
            };
            if parent == root {
                return true;
            }
            if !seen.insert(parent) {
                // only reachable if the table changed between reads
                debug!("Parent chain of {pid} loops at {parent}");
                return false;
            }
            current = parent;
        }
    }

    /// `pid` is `root` itself or one of its descendants.
    pub fn in_tree(&self, root: Pid, pid: Pid) -> bool {
        pid == root || self.is_descendant_of(root, pid)
    }
}
