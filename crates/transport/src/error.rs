//! Transport 错误类型

use contracts::{ContractError, PeerId};
use thiserror::Error;

/// Transport 错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 套接字绑定失败
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 地址无法解析
    #[error("invalid address '{addr}': {message}")]
    InvalidAddress { addr: String, message: String },

    /// 未知对端
    #[error("unknown peer {peer}")]
    UnknownPeer { peer: PeerId },

    /// 链路已关闭
    #[error("transport '{transport}' closed")]
    Closed { transport: String },

    /// 编解码失败
    #[error("codec error: {message}")]
    Codec { message: String },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn closed(transport: impl Into<String>) -> Self {
        Self::Closed {
            transport: transport.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}

impl From<TransportError> for ContractError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::UnknownPeer { peer } => ContractError::UnknownPeer { peer },
            TransportError::Closed { transport } => ContractError::TransportClosed { transport },
            TransportError::Codec { message } => ContractError::codec(message),
            TransportError::Io(e) => ContractError::Io(e),
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Transport Result 类型别名
pub type Result<T> = std::result::Result<T, TransportError>;
