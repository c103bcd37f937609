//! 错误类型定义

use thiserror::Error;

/// 国际象棋规则与数据模型错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的格子标签
    #[error("Invalid square: {label}")]
    InvalidSquare { label: String },

    /// 无效的走法文本
    #[error("Invalid move notation: {text}")]
    InvalidMove { text: String },

    /// 走法不合法
    #[error("Illegal move: {from} -> {to}")]
    IllegalMove { from: String, to: String },

    /// 没有棋子
    #[error("No piece at {square}")]
    NoPiece { square: String },

    /// 无效的升变棋子
    #[error("Invalid promotion piece: {symbol}")]
    InvalidPromotion { symbol: char },

    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },

    /// 棋谱与 FEN 缓存不一致
    #[error("History mismatch: {moves} moves but {fens} cached positions")]
    HistoryMismatch { moves: usize, fens: usize },
}

/// 规则操作结果类型
pub type Result<T> = std::result::Result<T, ChessError>;
