//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the peer sync workspace:
//! geometry, hand types, peer messages, configuration, events and the traits of the
//! external collaborators (transport, hand pose source, clock).
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every peer measures time in seconds (f64) on its own monotonic clock
//! - The client's view of host time is `client_time + clock_offset`

mod collaborators;
mod error;
mod event;
mod geometry;
mod hand;
mod message;
mod sync_config;

pub use collaborators::*;
pub use error::*;
pub use event::*;
pub use geometry::*;
pub use hand::*;
pub use message::*;
pub use sync_config::*;
