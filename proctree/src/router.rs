//! Command-line verbs mapped onto engine calls
//!
//! Invocation shapes:
//! - `<option> <root>` for `-dx`, `-dt`, `-dc`
//! - `<option> <root> [<pid>]` for every other option, `pid` defaulting to 0
//! - `<root> <pid>` for the ancestry report

use tracing::warn;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::{DispatchError, UsageError};
use crate::table::{Pid, ProcessTable};

pub const USAGE: &str = "[Option (optional)] [root_process] [process_id (optional)]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOption {
    TerminateDescendants,
    StopDescendants,
    ContinueDescendants,
    TerminateSpecific,
    ListNonDirect,
    ListImmediate,
    ListSiblings,
    ListDefunctSiblings,
    ListDefunctDescendants,
    ListGrandchildren,
    IsDefunct,
    KillZombieParents,
}

impl TreeOption {
    pub const ALL: [TreeOption; 12] = [
        TreeOption::TerminateDescendants,
        TreeOption::StopDescendants,
        TreeOption::ContinueDescendants,
        TreeOption::TerminateSpecific,
        TreeOption::ListNonDirect,
        TreeOption::ListImmediate,
        TreeOption::ListSiblings,
        TreeOption::ListDefunctSiblings,
        TreeOption::ListDefunctDescendants,
        TreeOption::ListGrandchildren,
        TreeOption::IsDefunct,
        TreeOption::KillZombieParents,
    ];

    pub fn flag(self) -> &'static str {
        match self {
            TreeOption::TerminateDescendants => "-dx",
            TreeOption::StopDescendants => "-dt",
            TreeOption::ContinueDescendants => "-dc",
            TreeOption::TerminateSpecific => "-rp",
            TreeOption::ListNonDirect => "-nd",
            TreeOption::ListImmediate => "-dd",
            TreeOption::ListSiblings => "-sb",
            TreeOption::ListDefunctSiblings => "-bz",
            TreeOption::ListDefunctDescendants => "-zd",
            TreeOption::ListGrandchildren => "-gc",
            TreeOption::IsDefunct => "-sz",
            TreeOption::KillZombieParents => "-kz",
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|option| option.flag() == flag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `<root> <pid>`: print pid and parent if pid is in the tree
    Report { root: Pid, pid: Pid },
    Apply { option: TreeOption, root: Pid, pid: Pid },
    Unrecognized { flag: String, root: Pid, pid: Pid },
}

/// Validate the words after the program name.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Invocation, UsageError> {
    if !(2..=3).contains(&args.len()) {
        return Err(UsageError::ArgumentCount(args.len()));
    }
    let first = args[0].as_ref();

    if first.starts_with('-') {
        let root = parse_pid(args[1].as_ref(), UsageError::RootNotNumeric)?;
        let pid = match args.get(2) {
            Some(word) => parse_pid(word.as_ref(), UsageError::PidNotNumeric)?,
            None => 0,
        };
        return Ok(match TreeOption::from_flag(first) {
            Some(option) => Invocation::Apply { option, root, pid },
            None => Invocation::Unrecognized {
                flag: first.to_string(),
                root,
                pid,
            },
        });
    }

    if let Some(extra) = args.get(2) {
        return Err(UsageError::UnexpectedArgument(extra.as_ref().to_string()));
    }
    let root = parse_pid(first, UsageError::RootNotNumeric)?;
    let pid = parse_pid(args[1].as_ref(), UsageError::PidNotNumeric)?;
    Ok(Invocation::Report { root, pid })
}

fn parse_pid(word: &str, not_numeric: fn(String) -> UsageError) -> Result<Pid, UsageError> {
    if word.is_empty() || !word.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_numeric(word.to_string()));
    }
    word.parse().map_err(|_| UsageError::OutOfRange(word.to_string()))
}

/// Lines produced by one invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Result lines, one per process id or status
    pub stdout: Vec<String>,
    /// Per-target delivery failures
    pub stderr: Vec<String>,
}

impl Outcome {
    fn line(line: impl Into<String>) -> Self {
        Self {
            stdout: vec![line.into()],
            stderr: Vec::new(),
        }
    }

    fn pids(pids: Vec<Pid>) -> Self {
        Self {
            stdout: pids.iter().map(Pid::to_string).collect(),
            stderr: Vec::new(),
        }
    }

    fn report(report: DispatchReport) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: report
                .failures
                .iter()
                .map(|(_, e)| format!("Failed to {}: {e}", report.action))
                .collect(),
        }
    }
}

pub struct Router<'a, T: ProcessTable> {
    dispatcher: Dispatcher<'a, T>,
}

impl<'a, T: ProcessTable> Router<'a, T> {
    pub fn new(dispatcher: Dispatcher<'a, T>) -> Self {
        Self { dispatcher }
    }

    fn not_in_tree(root: Pid, pid: Pid) -> Outcome {
        Outcome::line(DispatchError::NotInTree { root, pid }.to_string())
    }

    pub fn run(&self, invocation: &Invocation) -> Outcome {
        let classifier = self.dispatcher.classifier();
        let ancestry = classifier.ancestry();

        match *invocation {
            Invocation::Report { root, pid } => {
                if !ancestry.in_tree(root, pid) {
                    return Self::not_in_tree(root, pid);
                }
                let ppid = classifier
                    .parent_of(pid)
                    .map_or_else(|| "-1".to_string(), |p| p.to_string());
                Outcome::line(format!("PID: {pid} PPID: {ppid}"))
            }
            Invocation::Unrecognized { ref flag, .. } => {
                warn!("Unrecognized option {flag:?}");
                Outcome::line("Invalid option.")
            }
            Invocation::Apply { option, root, pid } => self.apply(option, root, pid),
        }
    }

    /// Run `f` only if `pid` is `root` or one of its descendants.
    fn within<F>(&self, root: Pid, pid: Pid, f: F) -> Outcome
    where
        F: FnOnce() -> Outcome,
    {
        if self.dispatcher.classifier().ancestry().in_tree(root, pid) {
            f()
        } else {
            Self::not_in_tree(root, pid)
        }
    }

    fn apply(&self, option: TreeOption, root: Pid, pid: Pid) -> Outcome {
        let d = &self.dispatcher;
        let c = d.classifier();

        match option {
            TreeOption::TerminateDescendants => Outcome::report(d.terminate_descendants(root)),
            TreeOption::StopDescendants => Outcome::report(d.stop_descendants(root)),
            TreeOption::ContinueDescendants => Outcome::report(d.continue_descendants(root)),
            TreeOption::TerminateSpecific => self.within(root, pid, || {
                match d.terminate_specific(root, pid) {
                    Ok(report) => Outcome::report(report),
                    Err(e) => Outcome::line(e.to_string()),
                }
            }),
            TreeOption::ListNonDirect => {
                self.within(root, pid, || Outcome::pids(c.non_direct_descendants(pid)))
            }
            TreeOption::ListImmediate => {
                self.within(root, pid, || Outcome::pids(c.immediate_descendants(pid)))
            }
            TreeOption::ListSiblings => self.within(root, pid, || Outcome::pids(c.siblings(pid))),
            TreeOption::ListDefunctSiblings => {
                self.within(root, pid, || Outcome::pids(c.defunct_siblings(pid)))
            }
            TreeOption::ListDefunctDescendants => {
                self.within(root, pid, || Outcome::pids(c.defunct_descendants(pid)))
            }
            TreeOption::ListGrandchildren => {
                self.within(root, pid, || Outcome::pids(c.grandchildren(pid)))
            }
            TreeOption::IsDefunct => self.within(root, pid, || {
                Outcome::line(if c.is_defunct(pid) { "Defunct" } else { "Not Defunct" })
            }),
            TreeOption::KillZombieParents => {
                self.within(root, pid, || Outcome::report(d.kill_zombie_parents(pid)))
            }
        }
    }
}
