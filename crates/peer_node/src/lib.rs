//! # Peer Node
//!
//! 单个对等节点的运行时：把传输层、手部追踪源和本地时钟接到同步引擎上。
//!
//! 每个节点只有一个任务，串行处理：
//! - 传输层收件箱中的消息（主机点对点回复请求方）
//! - 时钟探测节拍（仅客户端，启动后立即开始探测）
//! - 帧节拍（手部关节采样、手势触发器、会话超时）
//! - 来自 [`NodeHandle`] 的命令
//!
//! 收敛等事件通过 `tokio::sync::broadcast` 发布，订阅者随时加入或退出。

mod clock;
mod error;
mod handle;
mod node;
mod report;

pub use clock::MonotonicClock;
pub use error::NodeError;
pub use handle::NodeHandle;
pub use node::{PeerNode, EVENT_CHANNEL_CAPACITY};
pub use report::NodeReport;
