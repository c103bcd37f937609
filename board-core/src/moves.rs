//! 走法定义

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChessError;
use crate::piece::{Piece, PieceKind, Square};

/// 走法提议：起点、终点、可选升变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl Move {
    /// 创建普通走法
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// 创建升变走法
    pub fn with_promotion(from: Square, to: Square, kind: PieceKind) -> Self {
        Self {
            from,
            to,
            promotion: Some(kind),
        }
    }

    /// UCI 文本，例如 `e2e4`、`e7e8q`
    pub fn to_uci(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChessError::InvalidMove {
            text: s.to_string(),
        };
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(invalid());
        }
        let from: Square = s[0..2].parse().map_err(|_| invalid())?;
        let to: Square = s[2..4].parse().map_err(|_| invalid())?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_symbol(c) {
                Some(kind) if kind.is_promotion_target() => Some(kind),
                _ => return Err(ChessError::InvalidPromotion { symbol: c }),
            },
        };
        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

/// 已提交走法的结果，由规则引擎给出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    /// 走动的棋子
    pub piece: Piece,
    /// 被吃的棋子
    pub captured: Option<Piece>,
    pub promotion: Option<PieceKind>,
    /// 标准代数记谱
    pub san: String,
}

impl MoveRecord {
    /// 还原为走法提议
    pub fn as_move(&self) -> Move {
        Move {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }

    /// 是否吃子
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}
