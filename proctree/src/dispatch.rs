//! Signal delivery to computed target sets
//!
//! Targets are selected through the [`Classifier`] and signalled one at a
//! time. A failed delivery is recorded in the [`DispatchReport`] and never
//! stops the rest of the batch.

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use std::fmt;
use tracing::{debug, info, warn};

use crate::classify::Classifier;
use crate::config::SignalsConfig;
use crate::error::{DeliveryError, DispatchError};
use crate::table::{Pid, ProcessState, ProcessTable};

/// What a dispatch does to its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Terminate,
    Stop,
    Continue,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Terminate => "terminate",
            Action::Stop => "stop",
            Action::Continue => "continue",
        };
        f.write_str(name)
    }
}

/// The concrete signal sent for each [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPlan {
    pub terminate: Signal,
    pub stop: Signal,
    pub resume: Signal,
}

impl Default for SignalPlan {
    fn default() -> Self {
        Self {
            terminate: Signal::SIGKILL,
            stop: Signal::SIGSTOP,
            resume: Signal::SIGCONT,
        }
    }
}

impl SignalPlan {
    pub fn from_config(config: &SignalsConfig) -> Result<Self> {
        Ok(Self {
            terminate: parse_signal_name(&config.terminate).context("signals.terminate")?,
            stop: parse_signal_name(&config.stop).context("signals.stop")?,
            resume: parse_signal_name(&config.resume).context("signals.continue")?,
        })
    }

    pub fn signal_for(&self, action: Action) -> Signal {
        match action {
            Action::Terminate => self.terminate,
            Action::Stop => self.stop,
            Action::Continue => self.resume,
        }
    }
}

/// Convert a signal name string to a nix Signal
pub fn parse_signal_name(name: &str) -> Result<Signal> {
    // Normalise: strip optional "SIG" prefix, uppercase
    let normalised = name.trim().to_uppercase();
    let normalised = normalised.strip_prefix("SIG").unwrap_or(&normalised);

    match normalised {
        "HUP" => Ok(Signal::SIGHUP),
        "INT" => Ok(Signal::SIGINT),
        "QUIT" => Ok(Signal::SIGQUIT),
        "ABRT" | "IOT" => Ok(Signal::SIGABRT),
        "KILL" => Ok(Signal::SIGKILL),
        "USR1" => Ok(Signal::SIGUSR1),
        "USR2" => Ok(Signal::SIGUSR2),
        "ALRM" => Ok(Signal::SIGALRM),
        "TERM" => Ok(Signal::SIGTERM),
        "CONT" => Ok(Signal::SIGCONT),
        "STOP" => Ok(Signal::SIGSTOP),
        "TSTP" => Ok(Signal::SIGTSTP),
        "TTIN" => Ok(Signal::SIGTTIN),
        "TTOU" => Ok(Signal::SIGTTOU),
        _ => {
            // Try parsing as a number
            if let Ok(num) = normalised.parse::<i32>() {
                Signal::try_from(num).with_context(|| format!("Invalid signal number: {num}"))
            } else {
                Err(anyhow::anyhow!("Unknown signal name: {}", name))
            }
        }
    }
}

/// Something that can deliver a signal to a single process.
pub trait SignalSender {
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), DeliveryError>;
}

/// Delivers signals with `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NixSignaller;

impl SignalSender for NixSignaller {
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), DeliveryError> {
        // 0 and anything that turns negative would address a process group
        let raw = i32::try_from(pid)
            .ok()
            .filter(|raw| *raw > 0)
            .ok_or(DeliveryError::InvalidPid(pid))?;
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), signal)
            .map_err(|errno| DeliveryError::from_errno(pid, errno))
    }
}

/// Logs what would be sent and sends nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRun;

impl SignalSender for DryRun {
    fn send(&self, pid: Pid, signal: Signal) -> Result<(), DeliveryError> {
        info!("dry run: would send {} to {pid}", signal.as_str());
        Ok(())
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub action: Action,
    pub delivered: Vec<Pid>,
    pub failures: Vec<(Pid, DeliveryError)>,
}

impl DispatchReport {
    fn new(action: Action) -> Self {
        Self {
            action,
            delivered: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Every target that a signal was attempted on, in attempt order.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Dispatcher<'a, T: ProcessTable> {
    classifier: Classifier<'a, T>,
    sender: &'a dyn SignalSender,
    plan: SignalPlan,
}

impl<'a, T: ProcessTable> Dispatcher<'a, T> {
    pub fn new(
        classifier: Classifier<'a, T>,
        sender: &'a dyn SignalSender,
        plan: SignalPlan,
    ) -> Self {
        Self {
            classifier,
            sender,
            plan,
        }
    }

    pub fn classifier(&self) -> &Classifier<'a, T> {
        &self.classifier
    }

    fn deliver(&self, report: &mut DispatchReport, pid: Pid) {
        let signal = self.plan.signal_for(report.action);
        match self.sender.send(pid, signal) {
            Ok(()) => {
                debug!("Sent {} to {pid}", signal.as_str());
                report.delivered.push(pid);
            }
            Err(e) => {
                warn!("Failed to {} {pid}: {e}", report.action);
                report.failures.push((pid, e));
            }
        }
    }

    fn finish(&self, root: Pid, report: DispatchReport) -> DispatchReport {
        info!(
            "{} under {root}: {} delivered, {} failed",
            report.action,
            report.delivered.len(),
            report.failures.len()
        );
        report
    }

    fn signal_descendants(&self, root: Pid, action: Action) -> DispatchReport {
        let mut report = DispatchReport::new(action);
        for pid in self.classifier.descendants(root) {
            self.deliver(&mut report, pid);
        }
        self.finish(root, report)
    }

    /// Terminate every descendant of `root`, leaving `root` itself alone.
    pub fn terminate_descendants(&self, root: Pid) -> DispatchReport {
        self.signal_descendants(root, Action::Terminate)
    }

    /// Stop every descendant of `root`.
    pub fn stop_descendants(&self, root: Pid) -> DispatchReport {
        self.signal_descendants(root, Action::Stop)
    }

    /// Continue the descendants of `root` that are stopped right now.
    ///
    /// State is re-read immediately before each delivery, so processes that
    /// are already running are skipped.
    pub fn continue_descendants(&self, root: Pid) -> DispatchReport {
        let table = self.classifier.table();
        let ancestry = self.classifier.ancestry();
        let mut report = DispatchReport::new(Action::Continue);

        for pid in table.pids() {
            if pid == root || !ancestry.is_descendant_of(root, pid) {
                continue;
            }
            let stopped = table
                .record(pid)
                .is_some_and(|r| r.state == ProcessState::Stopped);
            if stopped {
                self.deliver(&mut report, pid);
            }
        }
        self.finish(root, report)
    }

    /// Terminate `pid` only if it is a descendant of `root`.
    pub fn terminate_specific(
        &self,
        root: Pid,
        pid: Pid,
    ) -> Result<DispatchReport, DispatchError> {
        if !self.classifier.ancestry().is_descendant_of(root, pid) {
            return Err(DispatchError::NotInTree { root, pid });
        }
        let mut report = DispatchReport::new(Action::Terminate);
        self.deliver(&mut report, pid);
        Ok(self.finish(root, report))
    }

    /// Terminate the parent of every zombie below `root`.
    ///
    /// A parent with several zombie children is signalled once per child,
    /// and `root` is targeted when it is the direct parent of a zombie.
    pub fn kill_zombie_parents(&self, root: Pid) -> DispatchReport {
        let table = self.classifier.table();
        let ancestry = self.classifier.ancestry();
        let mut report = DispatchReport::new(Action::Terminate);

        for pid in table.pids() {
            if pid == root || !ancestry.is_descendant_of(root, pid) {
                continue;
            }
            let Some(record) = table.record(pid) else {
                continue;
            };
            if record.state != ProcessState::Zombie {
                continue;
            }
            let Some(parent) = record.parent else {
                debug!("Zombie {pid} has no readable parent");
                continue;
            };
            if parent == root {
                warn!("Zombie {pid} is a direct child of root {root}; terminating root");
            }
            self.deliver(&mut report, parent);
        }
        self.finish(root, report)
    }
}
