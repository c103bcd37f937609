//! 棋盘引擎错误类型

use board_core::ChessError;
use thiserror::Error;

/// 引擎错误
#[derive(Error, Debug)]
pub enum EngineError {
    /// 规则错误（非法 FEN 等）
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),

    /// 调度域已关闭
    #[error("{domain} domain is closed")]
    DomainClosed { domain: &'static str },

    /// 没有待选择的升变
    #[error("No promotion is pending")]
    NoPendingPromotion,

    /// 当前模式未启用导航
    #[error("Navigation is disabled in this mode")]
    NavigationDisabled,

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 无法获取配置目录
    #[error("Config directory is unavailable")]
    NoConfigDir,

    /// 颜色格式错误
    #[error("Invalid color: {value}")]
    InvalidColor { value: String },
}

/// 引擎操作结果类型
pub type Result<T> = std::result::Result<T, EngineError>;
