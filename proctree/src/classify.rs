//! Descendant, sibling and zombie classification
//!
//! Every query is a fresh scan of the table. Nothing is indexed between
//! calls, and each candidate's parent and state come from one read.

use crate::ancestry::Ancestry;
use crate::table::{Pid, ProcessRecord, ProcessState, ProcessTable};

pub struct Classifier<'a, T: ProcessTable> {
    ancestry: Ancestry<'a, T>,
}

impl<'a, T: ProcessTable> Classifier<'a, T> {
    pub fn new(ancestry: Ancestry<'a, T>) -> Self {
        Self { ancestry }
    }

    pub fn ancestry(&self) -> &Ancestry<'a, T> {
        &self.ancestry
    }

    pub fn table(&self) -> &'a T {
        self.ancestry.table()
    }

    /// Enumerate the table once, keeping candidates other than `query`
    /// whose record satisfies `keep`. Candidates that vanish between
    /// enumeration and read are skipped.
    fn scan<F>(&self, query: Pid, keep: F) -> Vec<Pid>
    where
        F: Fn(&ProcessRecord) -> bool,
    {
        let table = self.table();
        table
            .pids()
            .into_iter()
            .filter(|&pid| pid != query)
            .filter(|&pid| table.record(pid).is_some_and(|record| keep(&record)))
            .collect()
    }

    /// Parent of `pid`, if it is in the table and its parent is known.
    pub fn parent_of(&self, pid: Pid) -> Option<Pid> {
        self.table().record(pid).and_then(|r| r.parent)
    }

    /// Every process below `pid`, at any depth.
    pub fn descendants(&self, pid: Pid) -> Vec<Pid> {
        self.scan(pid, |r| self.ancestry.is_descendant_of(pid, r.pid))
    }

    /// Children of `pid`.
    pub fn immediate_descendants(&self, pid: Pid) -> Vec<Pid> {
        self.scan(pid, |r| r.parent == Some(pid))
    }

    /// Descendants of `pid` that are not its children.
    pub fn non_direct_descendants(&self, pid: Pid) -> Vec<Pid> {
        self.scan(pid, |r| {
            r.parent != Some(pid) && self.ancestry.is_descendant_of(pid, r.pid)
        })
    }

    /// Other children of `pid`'s parent.
    pub fn siblings(&self, pid: Pid) -> Vec<Pid> {
        match self.parent_of(pid) {
            Some(parent) => self.scan(pid, |r| r.parent == Some(parent)),
            None => Vec::new(),
        }
    }

    /// Siblings of `pid` that are zombies.
    pub fn defunct_siblings(&self, pid: Pid) -> Vec<Pid> {
        match self.parent_of(pid) {
            Some(parent) => self.scan(pid, |r| {
                r.parent == Some(parent) && r.state == ProcessState::Zombie
            }),
            None => Vec::new(),
        }
    }

    /// Descendants of `pid` at any depth that are zombies.
    pub fn defunct_descendants(&self, pid: Pid) -> Vec<Pid> {
        self.scan(pid, |r| {
            r.state == ProcessState::Zombie && self.ancestry.is_descendant_of(pid, r.pid)
        })
    }

    /// Children of the children of `pid`, one scan per child.
    pub fn grandchildren(&self, pid: Pid) -> Vec<Pid> {
        self.immediate_descendants(pid)
            .into_iter()
            .flat_map(|child| self.immediate_descendants(child))
            .collect()
    }

    /// `pid` is present and a zombie.
    pub fn is_defunct(&self, pid: Pid) -> bool {
        self.table()
            .record(pid)
            .is_some_and(|r| r.state == ProcessState::Zombie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::INIT_PID;
    use crate::table::{MemoryTable, ProcessState::*};

    // 1 ── 100 ── 101 ── 103 (Z)
    //  │      │      └── 104
    //  │      ├── 102 ── 105 ── 106
    //  │      └── 107 (Z)
    //  └── 200
    fn sample() -> MemoryTable {
        MemoryTable::new()
            .with(1, 0, Sleeping)
            .with(100, 1, Sleeping)
            .with(101, 100, Running)
            .with(102, 100, Sleeping)
            .with(103, 101, Zombie)
            .with(104, 101, Running)
            .with(105, 102, Stopped)
            .with(106, 105, Running)
            .with(107, 100, Zombie)
            .with(200, 1, Sleeping)
    }

    fn classifier(table: &MemoryTable) -> Classifier<'_, MemoryTable> {
        Classifier::new(Ancestry::new(table, INIT_PID))
    }

    #[test]
    fn test_immediate_descendants() {
        let table = sample();
        let c = classifier(&table);
        assert_eq!(c.immediate_descendants(100), vec![101, 102, 107]);
        assert_eq!(c.immediate_descendants(105), vec![106]);
        assert!(c.immediate_descendants(106).is_empty());
    }

    #[test]
    fn test_non_direct_descendants() {
        let table = sample();
        let c = classifier(&table);
        assert_eq!(c.non_direct_descendants(100), vec![103, 104, 105, 106]);
    }

    #[test]
    fn test_direct_and_non_direct_are_disjoint() {
        let table = sample();
        let c = classifier(&table);
        for pid in table.pids() {
            let direct = c.immediate_descendants(pid);
            let indirect = c.non_direct_descendants(pid);
            assert!(direct.iter().all(|d| !indirect.contains(d)));
            let mut union = [direct, indirect].concat();
            union.sort_unstable();
            let mut all = c.descendants(pid);
            all.sort_unstable();
            assert_eq!(union, all);
        }
    }

    #[test]
    fn test_siblings() {
        let table = sample();
        let c = classifier(&table);
        assert_eq!(c.siblings(101), vec![102, 107]);
        assert_eq!(c.siblings(100), vec![200]);
        for pid in table.pids() {
            assert!(!c.siblings(pid).contains(&pid));
        }
    }

    #[test]
    fn test_defunct_siblings_and_descendants() {
        let table = sample();
        let c = classifier(&table);
        assert_eq!(c.defunct_siblings(101), vec![107]);
        assert!(c.defunct_siblings(107).is_empty());
        assert_eq!(c.defunct_descendants(100), vec![103, 107]);
        assert_eq!(c.defunct_descendants(101), vec![103]);
        assert!(c.defunct_descendants(102).is_empty());
    }

    #[test]
    fn test_grandchildren() {
        let table = sample();
        let c = classifier(&table);
        assert_eq!(c.grandchildren(100), vec![103, 104, 105]);
        assert_eq!(c.grandchildren(102), vec![106]);
        assert!(c.grandchildren(101).is_empty());
    }

    #[test]
    fn test_is_defunct() {
        let table = sample();
        let c = classifier(&table);
        assert!(c.is_defunct(103));
        assert!(!c.is_defunct(101));
        assert!(!c.is_defunct(9999));
    }

    #[test]
    fn test_absent_process_yields_empty_sets() {
        let table = sample();
        let c = classifier(&table);
        assert!(c.immediate_descendants(9999).is_empty());
        assert!(c.non_direct_descendants(9999).is_empty());
        assert!(c.siblings(9999).is_empty());
        assert!(c.defunct_siblings(9999).is_empty());
        assert!(c.defunct_descendants(9999).is_empty());
        assert!(c.grandchildren(9999).is_empty());
        assert_eq!(c.parent_of(9999), None);
    }

    #[test]
    fn test_rescans_after_mutation() {
        let table = sample();
        let c = classifier(&table);
        assert_eq!(c.immediate_descendants(101), vec![103, 104]);
        table.remove(103);
        table.insert(108, Some(101), Running);
        assert_eq!(c.immediate_descendants(101), vec![104, 108]);
        table.set_state(104, Zombie);
        assert_eq!(c.defunct_descendants(101), vec![104]);
    }

    #[test]
    fn test_orphan_has_no_siblings() {
        let table = MemoryTable::new()
            .with_orphan(50, Running)
            .with_orphan(51, Running);
        let c = classifier(&table);
        assert!(c.siblings(50).is_empty());
    }
}
