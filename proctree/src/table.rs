//! Process table access
//!
//! The engine never owns a process table. It reads one through the
//! [`ProcessTable`] trait, which has two implementations:
//! - [`ProcFs`] reads the live table from `/proc/<pid>/stat`
//! - [`MemoryTable`] is an in-memory table for tests and dry analysis

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Process identifier as it appears in `/proc`.
pub type Pid = u32;

/// Lifecycle state of a process, folded from the kernel's one-letter codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Other,
}

impl ProcessState {
    /// Map a `/proc/<pid>/stat` state letter
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            // D (uninterruptible) and I (idle kernel thread) are both waits
            'S' | 'D' | 'I' => ProcessState::Sleeping,
            'T' | 't' => ProcessState::Stopped,
            'Z' => ProcessState::Zombie,
            _ => ProcessState::Other,
        }
    }
}

/// Parent and state of one process, read together in a single access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: Pid,
    /// `None` when the parent could not be determined
    pub parent: Option<Pid>,
    pub state: ProcessState,
}

/// Read access to a process table that may change between any two calls.
pub trait ProcessTable {
    /// Parent and state of `pid`, or `None` if the process is not in the table.
    fn record(&self, pid: Pid) -> Option<ProcessRecord>;

    /// Every process identifier currently visible, in discovery order.
    fn pids(&self) -> Vec<Pid>;
}

/// Live process table backed by procfs.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcessTable for ProcFs {
    fn record(&self, pid: Pid) -> Option<ProcessRecord> {
        let path = self.root.join(pid.to_string()).join("stat");
        let contents = fs::read_to_string(&path).ok()?;
        match parse_stat(&contents) {
            Some((state, parent)) => Some(ProcessRecord { pid, parent, state }),
            None => {
                debug!("Unparseable stat for pid {pid}: {}", path.display());
                None
            }
        }
    }

    fn pids(&self) -> Vec<Pid> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot enumerate {}: {e}", self.root.display());
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_pid_name(&entry.file_name().to_string_lossy()))
            .collect()
    }
}

/// Accept only directory names made entirely of digits that name a positive pid.
fn parse_pid_name(name: &str) -> Option<Pid> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<Pid>().ok().filter(|pid| *pid > 0)
}

/// Parse the state and parent fields of `/proc/<pid>/stat`.
///
/// Layout is `pid (comm) state ppid ...`. `comm` may itself contain spaces and
/// parentheses, so fields are read after the last `)`.
pub fn parse_stat(contents: &str) -> Option<(ProcessState, Option<Pid>)> {
    let close = contents.rfind(')')?;
    let mut fields = contents[close + 1..].split_whitespace();

    let state = ProcessState::from_code(fields.next()?.chars().next()?);
    let ppid: i64 = fields.next()?.parse().ok()?;
    let parent = Pid::try_from(ppid).ok();

    Some((state, parent))
}

/// In-memory process table.
///
/// Discovery order is insertion order. Mutators take `&self` so a test can
/// change the table while an engine holds a borrow of it, the way the kernel
/// changes `/proc` underneath a running scan.
#[derive(Debug, Default)]
pub struct MemoryTable {
    records: RefCell<Vec<ProcessRecord>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryTable::insert`].
    pub fn with(self, pid: Pid, parent: Pid, state: ProcessState) -> Self {
        self.insert(pid, Some(parent), state);
        self
    }

    /// Add a process whose parent cannot be determined.
    pub fn with_orphan(self, pid: Pid, state: ProcessState) -> Self {
        self.insert(pid, None, state);
        self
    }

    /// Insert or replace the record for `pid`.
    pub fn insert(&self, pid: Pid, parent: Option<Pid>, state: ProcessState) {
        let record = ProcessRecord { pid, parent, state };
        let mut records = self.records.borrow_mut();
        match records.iter_mut().find(|r| r.pid == pid) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Change the state of `pid`. Returns false if it is not in the table.
    pub fn set_state(&self, pid: Pid, state: ProcessState) -> bool {
        match self.records.borrow_mut().iter_mut().find(|r| r.pid == pid) {
            Some(record) => {
                record.state = state;
                true
            }
            None => false,
        }
    }

    /// Drop `pid` from the table, as if it exited and was reaped.
    pub fn remove(&self, pid: Pid) -> Option<ProcessRecord> {
        let mut records = self.records.borrow_mut();
        let index = records.iter().position(|r| r.pid == pid)?;
        Some(records.remove(index))
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl ProcessTable for MemoryTable {
    fn record(&self, pid: Pid) -> Option<ProcessRecord> {
        self.records.borrow().iter().find(|r| r.pid == pid).copied()
    }

    fn pids(&self) -> Vec<Pid> {
        self.records.borrow().iter().map(|r| r.pid).collect()
    }
}
