//! proctree: ancestry queries and signal dispatch over a live process table
//!
//! Layers, leaf first:
//! - [`table`]: reads process records (`/proc` or in memory)
//! - [`ancestry`]: walks parent chains
//! - [`classify`]: descendant, sibling and zombie sets
//! - [`dispatch`]: terminate, stop and continue over those sets
//! - [`router`]: command-line verbs mapped onto the above

pub mod ancestry;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod table;

pub use ancestry::{Ancestry, INIT_PID};
pub use classify::Classifier;
pub use dispatch::{
    Action, DispatchReport, Dispatcher, DryRun, NixSignaller, SignalPlan, SignalSender,
};
pub use error::{DeliveryError, DispatchError, UsageError};
pub use router::{parse_args, Invocation, Outcome, Router, TreeOption};
pub use table::{MemoryTable, Pid, ProcFs, ProcessRecord, ProcessState, ProcessTable};
