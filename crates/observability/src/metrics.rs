//! Peer sync 指标收集模块
//!
//! 记录时钟偏移探测、位姿配对、对齐会话与消息收发的运行指标。

use std::collections::HashMap;

use contracts::{Role, SyncEvent};
use metrics::{counter, gauge, histogram};

/// 记录单次往返得到的偏移样本
pub fn record_clock_offset_sample(sample: f64) {
    counter!("peer_sync_clock_probes_total").increment(1);
    histogram!("peer_sync_clock_offset_sample_ms").record(sample * 1000.0);
}

/// 记录时钟偏移收敛
pub fn record_clock_offset_converged(offset: f64, rounds: u32) {
    counter!("peer_sync_clock_offset_converged_total").increment(1);
    gauge!("peer_sync_clock_offset_ms").set(offset * 1000.0);
    histogram!("peer_sync_clock_offset_rounds").record(rounds as f64);
}

/// 记录探测轮次耗尽
pub fn record_clock_probe_failed(rounds: u32) {
    counter!("peer_sync_clock_offset_failed_total").increment(1);
    histogram!("peer_sync_clock_offset_rounds").record(rounds as f64);
}

/// 记录主机处理位姿请求的结果
///
/// `outcome`: `answered` / `deviation_exceeded` / `no_samples`
pub fn record_pose_request(outcome: &str) {
    counter!(
        "peer_sync_pose_requests_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录客户端位姿对窗口深度
pub fn record_pose_pair(window_len: usize) {
    counter!("peer_sync_pose_pairs_total").increment(1);
    gauge!("peer_sync_pose_window_depth").set(window_len as f64);
}

/// 记录候选解
pub fn record_alignment_candidate(theta_degrees: f64) {
    counter!("peer_sync_alignment_candidates_total").increment(1);
    gauge!("peer_sync_alignment_candidate_theta_deg").set(theta_degrees);
}

/// 记录对齐收敛
pub fn record_alignment_converged(theta_degrees: f64) {
    gauge!("peer_sync_alignment_theta_deg").set(theta_degrees);
}

/// 记录会话生命周期事件
///
/// `event`: `started` / `stopped` / `converged` / `failed`
pub fn record_alignment_session(role: Role, event: &str) {
    counter!(
        "peer_sync_alignment_sessions_total",
        "role" => role.to_string(),
        "event" => event.to_string()
    )
    .increment(1);
}

/// 记录消息发送
pub fn record_message_sent(transport: &str, kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "peer_sync_messages_sent_total",
        "transport" => transport.to_string(),
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录消息接收
pub fn record_message_received(transport: &str, kind: &str) {
    counter!(
        "peer_sync_messages_received_total",
        "transport" => transport.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 单个节点的运行指标聚合器
///
/// 在内存中聚合，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SessionMetricsAggregator {
    /// 已发送消息数（按类型）
    pub messages_sent: HashMap<String, u64>,

    /// 已接收消息数（按类型）
    pub messages_received: HashMap<String, u64>,

    /// 发送失败数
    pub send_failures: u64,

    /// 已提交的时钟偏移 (秒)
    pub clock_offset: Option<f64>,

    /// 探测失败次数
    pub clock_failures: u64,

    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub sessions_converged: u64,
    pub sessions_failed: u64,

    /// 收敛结果的偏航角统计 (度)
    pub theta_stats: RunningStats,

    /// 收敛结果的平移长度统计 (米)
    pub translation_stats: RunningStats,
}

impl SessionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sent(&mut self, kind: &str, success: bool) {
        if success {
            *self.messages_sent.entry(kind.to_string()).or_insert(0) += 1;
        } else {
            self.send_failures += 1;
        }
    }

    pub fn on_received(&mut self, kind: &str) {
        *self.messages_received.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// 根据对外事件更新统计
    pub fn on_event(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::ClockOffsetConverged { offset } => self.clock_offset = Some(*offset),
            SyncEvent::ClockOffsetFailed { .. } => self.clock_failures += 1,
            SyncEvent::AlignmentStarted { .. } => self.sessions_started += 1,
            SyncEvent::AlignmentStopped { .. } => self.sessions_stopped += 1,
            SyncEvent::AlignmentConverged { result, .. } => {
                self.sessions_converged += 1;
                self.theta_stats.push(result.theta_degrees);
                self.translation_stats.push(result.translation.norm());
            }
            SyncEvent::AlignmentFailed { .. } => self.sessions_failed += 1,
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_sent: self.messages_sent.values().sum(),
            total_received: self.messages_received.values().sum(),
            send_failures: self.send_failures,
            clock_offset_ms: self.clock_offset.map(|o| o * 1000.0),
            clock_failures: self.clock_failures,
            sessions_started: self.sessions_started,
            sessions_converged: self.sessions_converged,
            sessions_failed: self.sessions_failed,
            theta_degrees: StatsSummary::from(&self.theta_stats),
            translation_m: StatsSummary::from(&self.translation_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_sent: u64,
    pub total_received: u64,
    pub send_failures: u64,
    pub clock_offset_ms: Option<f64>,
    pub clock_failures: u64,
    pub sessions_started: u64,
    pub sessions_converged: u64,
    pub sessions_failed: u64,
    pub theta_degrees: StatsSummary,
    pub translation_m: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Peer Sync Summary ===")?;
        writeln!(
            f,
            "Messages: sent={} received={} failed={}",
            self.total_sent, self.total_received, self.send_failures
        )?;
        match self.clock_offset_ms {
            Some(offset) => writeln!(f, "Clock offset: {:.3} ms", offset)?,
            None => writeln!(f, "Clock offset: not converged")?,
        }
        if self.clock_failures > 0 {
            writeln!(f, "Clock probe failures: {}", self.clock_failures)?;
        }
        writeln!(
            f,
            "Alignment sessions: started={} converged={} failed={}",
            self.sessions_started, self.sessions_converged, self.sessions_failed
        )?;
        writeln!(f, "Theta (deg): {}", self.theta_degrees)?;
        writeln!(f, "Translation (m): {}", self.translation_m)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm, population variance)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 总体方差（除以 N）
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
