//! Search Space Coordinator Library
//!
//! Splits a large search space into fixed-size work units and hands them to many
//! untrusted, intermittently connected workers. The binary (`main.rs`) wires these
//! modules to an HTTP server.
//!
//! ## Architecture Modules
//! - **`registry`**: Work units, their lease/completion state, and the `UnitStore`
//!   contract with in-memory and SQLite backends.
//! - **`lease`**: The lease allocator. Picks an eligible unit (in order or at random)
//!   and claims it with one conditional update so a unit never goes to two workers.
//! - **`submission`**: Validates a worker's results and commits them exactly once,
//!   completion marker last.
//! - **`retry`**: Bounded, jittered backoff applied to every store operation.
//! - **`coordinator`**: The `claim_next` / `submit_result` facade.
//! - **`api`**: Axum handlers and JSON protocol.
//! - **`config`**: Command line / environment configuration.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lease;
pub mod registry;
pub mod retry;
pub mod submission;
