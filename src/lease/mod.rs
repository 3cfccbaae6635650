//! Lease Allocation Module
//!
//! Hands out work units to requesting workers.
//!
//! ## Leasing Model
//! 1. **Selection**: the `SelectionPolicy` chooses between the earliest eligible unit
//!    (in-order progress) and a random one (spreads concurrent requesters).
//! 2. **Claim**: the chosen unit is leased by one conditional store update. Losing that
//!    race is not an error; the allocator selects again.
//! 3. **Expiry**: a lease is soft. Once older than the lease duration, the unit becomes
//!    eligible again, but a late submission from the original holder is still accepted
//!    as long as nobody completed the unit first.

pub mod allocator;
pub mod policy;
