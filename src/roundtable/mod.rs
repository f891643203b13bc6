// src/roundtable/mod.rs

pub mod analysis;
pub mod classifier;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod discussion;
pub mod event;
pub mod participant;
pub mod phase;
pub mod prompt;
pub mod repetition;
pub mod report;
pub mod resilience;
pub mod scenario;
pub mod statistics;
pub mod transcript;

// Let callers write roundtable::Discussion instead of roundtable::discussion::Discussion.
pub use discussion::{Discussion, DiscussionError, DiscussionOutcome};
