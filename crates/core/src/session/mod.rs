//! Session identity, lifecycle and per-batch bookkeeping.

mod ledger;
mod types;

pub use ledger::WorkLedger;
pub use types::{
    BatchIndex, FinalizeProgress, Payload, Session, SessionContext, SessionState, StatusSnapshot,
};
