//! 棋子与格子定义

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, SQUARE_COUNT};
use crate::error::ChessError;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    /// 兵
    Pawn,
    /// 马
    Knight,
    /// 象
    Bishop,
    /// 车
    Rook,
    /// 后
    Queen,
    /// 王
    King,
}

impl PieceKind {
    /// 升变可选的棋子类型
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    /// 小写符号（FEN / UCI 中使用）
    pub fn symbol(&self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    /// 从符号解析，大小写均可
    pub fn from_symbol(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// 是否可作为升变目标
    pub fn is_promotion_target(&self) -> bool {
        Self::PROMOTIONS.contains(self)
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// 白方（先手）
    White,
    /// 黑方
    Black,
}

impl Color {
    /// 获取对方阵营
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// 获取 FEN 字符
    pub fn to_fen_char(&self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    /// 从 FEN 字符解析
    pub fn from_fen_char(c: char) -> Option<Color> {
        match c {
            'w' | 'W' => Some(Color::White),
            'b' | 'B' => Some(Color::Black),
            _ => None,
        }
    }

    /// 兵升变所在的底线（0 起）
    pub fn promotion_rank(&self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

impl Piece {
    /// 创建新棋子
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    /// 获取 FEN 字符（白方大写，黑方小写）
    pub fn to_fen_char(&self) -> char {
        let c = self.kind.symbol();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// 从 FEN 字符解析
    pub fn from_fen_char(c: char) -> Option<Piece> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        PieceKind::from_symbol(c).map(|kind| Piece { kind, color })
    }

    /// 资源标识，例如 `wp`、`bk`
    pub fn code(&self) -> String {
        format!("{}{}", self.color.to_fen_char(), self.kind.symbol())
    }
}

/// 棋盘格子，索引为 rank * 8 + file（a1 = 0，h8 = 63）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square(u8);

impl Square {
    /// 由列、行创建（均为 0 起）
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if (file as usize) < BOARD_SIZE && (rank as usize) < BOARD_SIZE {
            Some(Self(rank * BOARD_SIZE as u8 + file))
        } else {
            None
        }
    }

    /// 由索引创建（不检查边界，调用方保证小于 64）
    pub(crate) const fn new_unchecked(index: u8) -> Self {
        Self(index)
    }

    /// 从数组索引转换
    pub fn from_index(index: usize) -> Option<Self> {
        if index < SQUARE_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// 转换为数组索引
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// 列（0 = a）
    pub fn file(&self) -> u8 {
        self.0 % BOARD_SIZE as u8
    }

    /// 行（0 = 第 1 行）
    pub fn rank(&self) -> u8 {
        self.0 / BOARD_SIZE as u8
    }

    /// 旋转 180 度后的格子（黑方视角）
    pub fn rotated(&self) -> Square {
        Square((SQUARE_COUNT - 1) as u8 - self.0)
    }

    /// 全部 64 个格子，按索引顺序
    pub fn all() -> impl Iterator<Item = Square> {
        (0..SQUARE_COUNT as u8).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }
}

impl FromStr for Square {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChessError::InvalidSquare {
            label: s.to_string(),
        };
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(invalid());
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Square {
    type Error = ChessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_fen_char() {
        let white_king = Piece::new(PieceKind::King, Color::White);
        assert_eq!(white_king.to_fen_char(), 'K');

        let black_knight = Piece::new(PieceKind::Knight, Color::Black);
        assert_eq!(black_knight.to_fen_char(), 'n');

        assert_eq!(
            Piece::from_fen_char('Q'),
            Some(Piece::new(PieceKind::Queen, Color::White))
        );
        assert_eq!(Piece::from_fen_char('x'), None);
        assert_eq!(black_knight.code(), "bn");
    }

    #[test]
    fn test_square_labels() {
        let e4: Square = "e4".parse().unwrap();
        assert_eq!(e4.file(), 4);
        assert_eq!(e4.rank(), 3);
        assert_eq!(e4.to_string(), "e4");
        assert_eq!(Square::from_index(0).unwrap().to_string(), "a1");
        assert_eq!(Square::from_index(63).unwrap().to_string(), "h8");
    }

    #[test]
    fn test_square_invalid() {
        assert!("i1".parse::<Square>().is_err());
        assert!("a9".parse::<Square>().is_err());
        assert!("a".parse::<Square>().is_err());
        assert!(Square::new(8, 0).is_none());
        assert!(Square::from_index(64).is_none());
    }

    #[test]
    fn test_square_rotated() {
        let a1: Square = "a1".parse().unwrap();
        let e2: Square = "e2".parse().unwrap();
        assert_eq!(a1.rotated().to_string(), "h8");
        assert_eq!(e2.rotated().to_string(), "d7");
        assert_eq!(e2.rotated().rotated(), e2);
    }

    #[test]
    fn test_square_all() {
        let squares: Vec<Square> = Square::all().collect();
        assert_eq!(squares.len(), 64);
        assert_eq!(squares[12].to_string(), "e2");
    }

    #[test]
    fn test_square_serde_as_label() {
        let e4: Square = "e4".parse().unwrap();
        let json = serde_json::to_string(&e4).unwrap();
        assert_eq!(json, "\"e4\"");
        let back: Square = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e4);
    }

    #[test]
    fn test_color_opponent() {
        assert_eq!(Color::White.opponent(), Color::Black);
        assert_eq!(Color::Black.promotion_rank(), 0);
    }
}
