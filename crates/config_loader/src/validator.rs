//! 配置校验模块
//!
//! 校验规则：
//! - 窗口容量 > 0
//! - 阈值与周期 > 0
//! - timestamp_deviation_tolerance_seconds < hand_joint_pose_retention_seconds
//! - 可选上限 (max_probe_rounds / max_session_seconds) 若设置则 > 0
//! - 地址可解析；client 必须配置 host_addr

use std::net::SocketAddr;

use contracts::{ContractError, PeerSyncConfig, Role};

/// 校验 PeerSyncConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &PeerSyncConfig) -> Result<(), ContractError> {
    validate_network(config)?;
    validate_clock(config)?;
    validate_alignment(config)?;
    validate_trigger(config)?;
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), ContractError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("must be a finite value > 0, got {value}"),
        ))
    }
}

fn non_zero(field: &str, value: usize) -> Result<(), ContractError> {
    if value == 0 {
        return Err(ContractError::config_validation(field, "must be > 0"));
    }
    Ok(())
}

fn socket_addr(field: &str, value: &str) -> Result<(), ContractError> {
    value.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
        ContractError::config_validation(field, format!("invalid socket address '{value}': {e}"))
    })
}

/// 校验网络配置
fn validate_network(config: &PeerSyncConfig) -> Result<(), ContractError> {
    let network = &config.network;
    socket_addr("network.bind_addr", &network.bind_addr)?;

    match (&network.host_addr, config.role) {
        (Some(addr), _) => socket_addr("network.host_addr", addr),
        (None, Role::Client) => Err(ContractError::config_validation(
            "network.host_addr",
            "client role requires host_addr",
        )),
        (None, Role::Host) => Ok(()),
    }
}

/// 校验时钟偏移探测配置
fn validate_clock(config: &PeerSyncConfig) -> Result<(), ContractError> {
    let clock = &config.clock;
    non_zero("clock.offset_window_size", clock.offset_window_size)?;
    positive(
        "clock.offset_std_dev_threshold_seconds",
        clock.offset_std_dev_threshold_seconds,
    )?;
    positive("clock.probe_interval_seconds", clock.probe_interval_seconds)?;

    if clock.max_probe_rounds == Some(0) {
        return Err(ContractError::config_validation(
            "clock.max_probe_rounds",
            "must be > 0 when set",
        ));
    }
    Ok(())
}

/// 校验对齐配置
fn validate_alignment(config: &PeerSyncConfig) -> Result<(), ContractError> {
    let alignment = &config.alignment;
    non_zero("alignment.pose_window_size", alignment.pose_window_size)?;
    non_zero(
        "alignment.candidate_window_size",
        alignment.candidate_window_size,
    )?;
    positive(
        "alignment.hand_joint_pose_retention_seconds",
        alignment.hand_joint_pose_retention_seconds,
    )?;
    positive(
        "alignment.timestamp_deviation_tolerance_seconds",
        alignment.timestamp_deviation_tolerance_seconds,
    )?;
    positive(
        "alignment.theta_std_dev_threshold_degrees",
        alignment.theta_std_dev_threshold_degrees,
    )?;
    positive(
        "alignment.frame_interval_seconds",
        alignment.frame_interval_seconds,
    )?;

    if alignment.timestamp_deviation_tolerance_seconds
        >= alignment.hand_joint_pose_retention_seconds
    {
        return Err(ContractError::config_validation(
            "alignment.timestamp_deviation_tolerance_seconds / alignment.hand_joint_pose_retention_seconds",
            format!(
                "tolerance ({}) must be < retention ({})",
                alignment.timestamp_deviation_tolerance_seconds,
                alignment.hand_joint_pose_retention_seconds
            ),
        ));
    }

    if let Some(limit) = alignment.max_session_seconds {
        positive("alignment.max_session_seconds", limit)?;
    }
    Ok(())
}

/// 校验手势触发配置
fn validate_trigger(config: &PeerSyncConfig) -> Result<(), ContractError> {
    let hold = config.trigger.fist_hold_seconds;
    if !hold.is_finite() || hold < 0.0 {
        return Err(ContractError::config_validation(
            "trigger.fist_hold_seconds",
            format!("must be >= 0, got {hold}"),
        ));
    }
    Ok(())
}
