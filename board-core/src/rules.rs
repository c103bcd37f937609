//! 规则引擎接口
//!
//! 棋盘引擎不实现国际象棋规则，所有合法性判断都通过该 trait 委托给外部实现。

use serde::{Deserialize, Serialize};

use crate::board::BoardMatrix;
use crate::error::Result;
use crate::moves::{Move, MoveRecord};
use crate::piece::{Color, Piece, Square};

/// 规则引擎协作者
///
/// 调用方视角下全部为同步操作。`load_fen` 失败时不得改动当前局面。
pub trait RulesEngine: Send {
    /// 载入 FEN 局面，同时清空悔棋栈
    fn load_fen(&mut self, fen: &str) -> Result<()>;

    /// 恢复初始局面
    fn reset(&mut self);

    /// 当前局面的 FEN
    fn fen(&self) -> String;

    /// 当前走子方
    fn turn(&self) -> Color;

    /// 指定格子上棋子的合法目标格（去重）
    fn legal_moves(&self, from: Square) -> Vec<Square>;

    /// 执行走法，不合法时返回 None 且不改动局面
    fn make_move(&mut self, mv: Move) -> Option<MoveRecord>;

    /// 撤销上一步，没有可撤销的走法时返回 None
    fn undo(&mut self) -> Option<Move>;

    /// 指定格子上的棋子
    fn piece_at(&self, square: Square) -> Option<Piece>;

    fn is_check(&self) -> bool;
    fn is_checkmate(&self) -> bool;
    fn is_stalemate(&self) -> bool;
    fn is_insufficient_material(&self) -> bool;
    fn is_threefold_repetition(&self) -> bool;

    /// 和棋（含 50 回合规则）
    fn is_draw(&self) -> bool;

    fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }

    /// 走法是否合法（不区分升变类型）
    fn is_legal(&self, from: Square, to: Square) -> bool {
        self.legal_moves(from).contains(&to)
    }

    /// 重新生成棋盘矩阵
    fn board(&self) -> BoardMatrix {
        let mut board = BoardMatrix::empty();
        for square in Square::all() {
            board.set(square, self.piece_at(square));
        }
        board
    }
}

/// 交给宿主回调与 `get_state` 的局面状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessboardState {
    pub in_check: bool,
    pub in_checkmate: bool,
    pub in_draw: bool,
    pub in_stalemate: bool,
    pub in_threefold_repetition: bool,
    pub insufficient_material: bool,
    pub game_over: bool,
    pub fen: String,
    /// 刚提交的走法是否为升变
    pub in_promotion: bool,
}

impl ChessboardState {
    /// 从规则引擎采集当前状态
    pub fn capture(rules: &dyn RulesEngine, in_promotion: bool) -> Self {
        Self {
            in_check: rules.is_check(),
            in_checkmate: rules.is_checkmate(),
            in_draw: rules.is_draw(),
            in_stalemate: rules.is_stalemate(),
            in_threefold_repetition: rules.is_threefold_repetition(),
            insufficient_material: rules.is_insufficient_material(),
            game_over: rules.is_game_over(),
            fen: rules.fen(),
            in_promotion,
        }
    }
}
