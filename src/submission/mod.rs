//! Submission Module
//!
//! Accepts a worker's results for a leased unit exactly once.
//!
//! ## Flow
//! 1. **Validation** (`validator`): pure, ordered checks against the unit's current state.
//!    A rejected submission writes nothing.
//! 2. **Commit** (`committer`): chunked inserts of digit counts and near misses, then the
//!    completion marker as a conditional update so only one submission can win.

pub mod committer;
pub mod types;
pub mod validator;
