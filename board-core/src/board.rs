//! 棋盘矩阵
//!
//! 规则引擎每次落子后重新生成的只读 8x8 快照，渲染端据此挂载/卸载棋子。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, SQUARE_COUNT};
use crate::piece::{Color, Piece, PieceKind, Square};

/// 棋盘矩阵
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMatrix {
    /// 索引为 Square::index()，使用 Vec 以支持 serde
    squares: Vec<Option<Piece>>,
}

impl BoardMatrix {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; SQUARE_COUNT],
        }
    }

    /// 获取指定格子的棋子
    pub fn get(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    /// 设置指定格子的棋子
    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        self.squares[square.index()] = piece;
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, color: Color) -> Option<Square> {
        Square::all().find(|&square| {
            self.get(square) == Some(Piece::new(PieceKind::King, color))
        })
    }

    /// 获取指定阵营的所有棋子
    pub fn pieces(&self, color: Color) -> Vec<(Square, Piece)> {
        self.all_pieces()
            .into_iter()
            .filter(|(_, piece)| piece.color == color)
            .collect()
    }

    /// 获取所有棋子
    pub fn all_pieces(&self) -> Vec<(Square, Piece)> {
        Square::all()
            .filter_map(|square| self.get(square).map(|piece| (square, piece)))
            .collect()
    }

    /// 按行输出，第 8 行在前
    pub fn rows(&self) -> Vec<Vec<Option<Piece>>> {
        (0..BOARD_SIZE as u8)
            .rev()
            .map(|rank| {
                (0..BOARD_SIZE as u8)
                    .map(|file| Square::new(file, rank).and_then(|sq| self.get(sq)))
                    .collect()
            })
            .collect()
    }

    /// 棋子数量
    pub fn piece_count(&self) -> usize {
        self.squares.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for BoardMatrix {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for BoardMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().iter().enumerate() {
            write!(f, "{} ", BOARD_SIZE - i)?;
            for cell in row {
                let c = cell.map(|p| p.to_fen_char()).unwrap_or('.');
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        write!(f, "  a b c d e f g h")
    }
}
