//! End-to-end router scenarios against an in-memory process table
//!
//! Each test builds a table, runs one invocation through the router and
//! checks the printed lines and the signals that were sent.

use nix::sys::signal::Signal;
use std::cell::{Cell, RefCell};

use proctree::{
    parse_args, Ancestry, Classifier, DeliveryError, Dispatcher, Invocation, MemoryTable, Pid,
    ProcFs, ProcessRecord, ProcessState::*, ProcessTable, Router, SignalPlan, SignalSender,
    UsageError, INIT_PID,
};

#[derive(Default)]
struct SentLog {
    sent: RefCell<Vec<(Pid, Signal)>>,
}

impl SignalSender for SentLog {
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), DeliveryError> {
        self.sent.borrow_mut().push((pid, signal));
        Ok(())
    }
}

/// Counts every table access so tests can assert none happened.
struct CountingTable<'t> {
    inner: &'t MemoryTable,
    reads: Cell<usize>,
}

impl ProcessTable for CountingTable<'_> {
    fn record(&self, pid: Pid) -> Option<ProcessRecord> {
        self.reads.set(self.reads.get() + 1);
        self.inner.record(pid)
    }

    fn pids(&self) -> Vec<Pid> {
        self.reads.set(self.reads.get() + 1);
        self.inner.pids()
    }
}

fn run(table: &MemoryTable, sender: &SentLog, args: &[&str]) -> (Vec<String>, Vec<String>) {
    let invocation = parse_args(args).expect("valid invocation");
    let classifier = Classifier::new(Ancestry::new(table, INIT_PID));
    let router = Router::new(Dispatcher::new(classifier, sender, SignalPlan::default()));
    let outcome = router.run(&invocation);
    (outcome.stdout, outcome.stderr)
}

// 100 ── 101 ── 103 (Z)
//    └── 102
fn family() -> MemoryTable {
    MemoryTable::new()
        .with(1, 0, Sleeping)
        .with(100, 1, Sleeping)
        .with(101, 100, Sleeping)
        .with(102, 100, Running)
        .with(103, 101, Zombie)
        .with(300, 1, Running)
}

#[test]
fn test_grandchildren_and_zombies() {
    let table = family();
    let sender = SentLog::default();

    let (out, _) = run(&table, &sender, &["-gc", "100", "100"]);
    assert_eq!(out, vec!["103"]);

    let (out, _) = run(&table, &sender, &["-zd", "100", "100"]);
    assert_eq!(out, vec!["103"]);

    let (out, _) = run(&table, &sender, &["-kz", "100", "100"]);
    assert!(out.is_empty());
    assert_eq!(*sender.sent.borrow(), vec![(101, Signal::SIGKILL)]);
}

#[test]
fn test_terminate_specific_outside_tree() {
    let table = family();
    let sender = SentLog::default();

    let (out, _) = run(&table, &sender, &["-rp", "100", "300"]);
    assert_eq!(out, vec!["The process 300 does not belong to the tree rooted at 100"]);
    assert!(sender.sent.borrow().is_empty());

    let (out, _) = run(&table, &sender, &["-rp", "100", "102"]);
    assert!(out.is_empty());
    assert_eq!(*sender.sent.borrow(), vec![(102, Signal::SIGKILL)]);
}

#[test]
fn test_lone_root() {
    let table = MemoryTable::new().with(1, 0, Sleeping).with(500, 1, Running);
    let sender = SentLog::default();

    for flag in ["-nd", "-dd", "-sb", "-bz", "-zd", "-gc"] {
        let (out, _) = run(&table, &sender, &[flag, "500", "500"]);
        assert!(out.is_empty(), "{flag} printed {out:?}");
    }
    let (out, _) = run(&table, &sender, &["-sz", "500", "500"]);
    assert_eq!(out, vec!["Not Defunct"]);
}

#[test]
fn test_defunct_status() {
    let table = family();
    let sender = SentLog::default();
    let (out, _) = run(&table, &sender, &["-sz", "100", "103"]);
    assert_eq!(out, vec!["Defunct"]);
}

#[test]
fn test_default_pid_fails_membership() {
    let table = family();
    let sender = SentLog::default();
    let (out, _) = run(&table, &sender, &["-dd", "100"]);
    assert_eq!(out, vec!["The process 0 does not belong to the tree rooted at 100"]);
}

#[test]
fn test_ancestry_report() {
    let table = family();
    let sender = SentLog::default();

    let (out, _) = run(&table, &sender, &["100", "103"]);
    assert_eq!(out, vec!["PID: 103 PPID: 101"]);

    let (out, _) = run(&table, &sender, &["100", "300"]);
    assert_eq!(out, vec!["The process 300 does not belong to the tree rooted at 100"]);
}

#[test]
fn test_stop_and_continue_whole_tree() {
    let table = family();
    let sender = SentLog::default();

    run(&table, &sender, &["-dt", "100"]);
    assert_eq!(
        *sender.sent.borrow(),
        vec![
            (101, Signal::SIGSTOP),
            (102, Signal::SIGSTOP),
            (103, Signal::SIGSTOP)
        ]
    );

    // nothing is actually stopped in the table, so continue has no targets
    sender.sent.borrow_mut().clear();
    run(&table, &sender, &["-dc", "100"]);
    assert!(sender.sent.borrow().is_empty());

    table.set_state(102, Stopped);
    run(&table, &sender, &["-dc", "100"]);
    assert_eq!(*sender.sent.borrow(), vec![(102, Signal::SIGCONT)]);
}

#[test]
fn test_unknown_option_is_informational() {
    let table = family();
    let sender = SentLog::default();
    let (out, err) = run(&table, &sender, &["-xx", "100", "101"]);
    assert_eq!(out, vec!["Invalid option."]);
    assert!(err.is_empty());
}

#[test]
fn test_usage_error_reads_nothing() {
    let inner = family();
    let table = CountingTable {
        inner: &inner,
        reads: Cell::new(0),
    };
    assert_eq!(parse_args(&["100"]), Err(UsageError::ArgumentCount(1)));
    assert_eq!(table.reads.get(), 0);

    // the counting wrapper itself works
    let ancestry = Ancestry::new(&table, INIT_PID);
    assert!(ancestry.is_descendant_of(100, 103));
    assert!(table.reads.get() > 0);
}

#[test]
fn test_procfs_fixture_through_router() {
    let dir = tempfile::tempdir().unwrap();
    for (pid, line) in [
        (1, "1 (init) S 0"),
        (40, "40 (sshd) S 1"),
        (41, "41 (bash) S 40"),
        (42, "42 (sleep (1)) Z 41"),
    ] {
        let path = dir.path().join(pid.to_string());
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("stat"), line).unwrap();
    }

    let table = ProcFs::new(dir.path());
    let classifier = Classifier::new(Ancestry::new(&table, INIT_PID));
    let sender = SentLog::default();
    let router = Router::new(Dispatcher::new(classifier, &sender, SignalPlan::default()));

    let outcome = router.run(&Invocation::Report { root: 40, pid: 42 });
    assert_eq!(outcome.stdout, vec!["PID: 42 PPID: 41"]);

    let outcome = router.run(&parse_args(&["-zd", "40", "40"]).unwrap());
    assert_eq!(outcome.stdout, vec!["42"]);
}
