//! # CncTerm Communication
//!
//! Backend plumbing for CncTerm.
//! Defines the abstract transport capability, the machine simulator that
//! stands in for a physical controller, the simulator-backed transport and
//! the status cache fed by a background subscription.

pub mod simulator;
pub mod status_cache;
pub mod transport;

pub use simulator::{
    limits::SoftLimits,
    tokenizer::{tokenize, CommandKind, MachineCommand},
    MachineSimulator, SimulationOutcome, ESTOP_REASON,
};
pub use status_cache::StatusCache;
pub use transport::{
    endpoints, invoke_with_timeout, Transport, TransportResponse, VirtualTransport,
    DEFAULT_SUCCESS_MESSAGE,
};
