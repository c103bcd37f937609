//! 国际象棋棋盘共享数据模型
//!
//! 包含:
//! - 格子、棋子、走法等核心数据结构
//! - 棋盘矩阵快照与走法历史（含 FEN 缓存）
//! - 规则引擎接口 (RulesEngine) 及基于 shakmaty 的标准实现
//! - 宿主回调使用的局面状态 (ChessboardState)

mod board;
mod constants;
mod error;
mod history;
mod moves;
mod piece;
mod rules;
mod standard;

pub use board::BoardMatrix;
pub use constants::*;
pub use error::{ChessError, Result};
pub use history::MoveHistory;
pub use moves::{Move, MoveRecord};
pub use piece::{Color, Piece, PieceKind, Square};
pub use rules::{ChessboardState, RulesEngine};
pub use standard::StandardRules;
