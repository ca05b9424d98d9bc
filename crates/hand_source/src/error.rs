//! Hand source 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Hand source 错误
#[derive(Debug, Error)]
pub enum HandSourceError {
    /// 录制文件读取失败
    #[error("failed to read recording {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 录制文件解析失败
    #[error("failed to parse recording {path}: {message}")]
    Parse { path: String, message: String },

    /// 录制中没有样本
    #[error("recording {path} contains no samples")]
    Empty { path: String },
}

impl From<HandSourceError> for ContractError {
    fn from(err: HandSourceError) -> Self {
        ContractError::hand_source("recorded", err.to_string())
    }
}

/// Hand source Result 类型别名
pub type Result<T> = std::result::Result<T, HandSourceError>;
