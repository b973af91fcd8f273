//! Seat allocation core for hallpass.
//!
//! Students are registered against an exam sitting (the allocation
//! registry), a seating plan is proposed by an external text generator,
//! checked against the store (the plan validator) and applied atomically
//! (the plan committer). Hall tickets are assembled from the seated rows.
//!
//! Every operation takes the pool explicitly and re-reads current state;
//! nothing is cached between calls.

pub mod catalog;
pub mod error;
pub mod plan;
pub mod proposer;
pub mod registry;
pub mod scan;
pub mod seat;
pub mod ticket;

mod lookup;
mod txn;

pub use error::AllocationError;
pub use seat::SeatLabel;
