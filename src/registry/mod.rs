//! Work Unit Registry
//!
//! The set of all work units and their lease/completion state.
//!
//! ## Core Concepts
//! - **Work unit**: a contiguous subrange `[range_start, range_end)` of the search space,
//!   processed as one indivisible task. Boundaries are unique across units.
//! - **Eligibility**: a unit can be claimed when it is not completed and its lease is
//!   absent or older than the lease duration.
//! - **Derived rows**: digit counts and near misses, written once when a unit completes.
//!
//! ## Submodules
//! - **`types`**: plain data records passed by value between components.
//! - **`store`**: the `UnitStore` consistency contract (conditional updates, unique keys).
//! - **`memory`**: `DashMap` backend for tests and ephemeral runs.
//! - **`sqlite`**: durable backend.
//! - **`provision`**: fixed-size unit creation used at startup.

pub mod memory;
pub mod provision;
pub mod sqlite;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
