//! Core library for the dispatch server — configuration, domain types,
//! cost accounting, and the resilience primitives (circuit breaker,
//! resource monitor) shared by the agent-dispatch layer.

pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod cost_gate;
pub mod ledger;
pub mod pricing;
pub mod resource_monitor;
pub mod token_counter;
pub mod types;
