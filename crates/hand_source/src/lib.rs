//! # Hand Source
//!
//! `HandPoseSource` implementations.
//!
//! Responsibilities:
//! - Synthetic hand motion for simulation and tests (`SyntheticHandSource`)
//! - Replay of recorded joint poses from JSON (`RecordedHandSource`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use hand_source::{CircularMotion, FrameOffset, SyntheticHandSource};
//!
//! let host = SyntheticHandSource::new(CircularMotion::default());
//! let client = SyntheticHandSource::new(CircularMotion::default())
//!     .with_frame(FrameOffset::new(30.0, Vector3::new(0.5, 0.0, -1.0)))
//!     .with_time_origin(100.0);
//! ```

mod error;
mod recorded;
mod synthetic;

pub use error::{HandSourceError, Result};
pub use recorded::{RecordedHandSource, RecordedSample};
pub use synthetic::{CircularMotion, FrameOffset, SyntheticHandSource};
