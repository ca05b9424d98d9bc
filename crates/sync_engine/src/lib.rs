//! # Sync Engine
//!
//! 对等端时间同步与空间对齐估计器（无 IO，由运行时驱动）。
//!
//! 负责：
//! - 往返探测估计时钟偏移 (`ClockOffsetEstimator`)
//! - 主机端关节位姿缓存与最近时刻查询
//! - 偏航角 + 平移闭式求解
//! - 对齐会话与收敛判定 (`PoseAlignmentEstimator`)
//! - 握拳手势触发
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{ClockOffsetEstimator, ClockSyncOutcome};
//!
//! let mut clock = ClockOffsetEstimator::new(config.clock.clone());
//! clock.start();
//!
//! if let Some(request) = clock.tick(now) {
//!     transport.send(HOST_PEER_ID, request.into()).await?;
//! }
//! // later, when the reply arrives
//! if let Some(ClockSyncOutcome::Converged { offset }) = clock.on_round_trip(&reply, now) {
//!     // offset ready for alignment
//! }
//! ```

mod alignment;
mod clock_offset;
mod error;
mod pose_history;
mod solver;
mod trigger;
mod window;

pub use alignment::{AlignmentState, ClientAligner, HostAligner, PoseAlignmentEstimator};
pub use clock_offset::{offset_sample, ClockOffsetEstimator, ClockSyncOutcome, ProbeState};
pub use error::AlignmentError;
pub use pose_history::HostPoseHistory;
pub use solver::{solve_yaw_alignment, yaw_rotation, AlignmentCandidate, PosePair};
pub use trigger::{GestureTrigger, TriggerAction};
pub use window::{mean, population_std_dev, FifoWindow};

// Re-export contracts types
pub use contracts::{AlignmentConfig, AlignmentResult, ClockSyncConfig, TriggerConfig};
