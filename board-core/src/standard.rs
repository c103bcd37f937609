//! 基于 shakmaty 的标准规则引擎

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position, Role};

use crate::constants::FIFTY_MOVE_HALFMOVES;
use crate::error::{ChessError, Result};
use crate::moves::{Move, MoveRecord};
use crate::piece::{Color, Piece, PieceKind, Square};
use crate::rules::RulesEngine;

/// 标准国际象棋规则
#[derive(Debug, Clone, Default)]
pub struct StandardRules {
    position: Chess,
    /// 悔棋栈：走子前的局面与走法
    undo_stack: Vec<(Chess, Move)>,
    /// 重复局面判定用的键（FEN 前四段），含当前局面
    repetitions: Vec<String>,
}

impl StandardRules {
    /// 创建初始局面
    pub fn new() -> Self {
        let mut rules = Self::default();
        rules.repetitions.push(rules.repetition_key());
        rules
    }

    /// 从 FEN 创建
    pub fn from_fen(fen: &str) -> Result<Self> {
        let mut rules = Self::new();
        rules.load_fen(fen)?;
        Ok(rules)
    }

    fn parse(fen: &str) -> Result<Chess> {
        let parsed: Fen = fen.trim().parse().map_err(|e| ChessError::InvalidFen {
            reason: format!("{}", e),
        })?;
        parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| ChessError::InvalidFen {
                reason: format!("{}", e),
            })
    }

    fn repetition_key(&self) -> String {
        self.fen().split(' ').take(4).collect::<Vec<_>>().join(" ")
    }

    /// 找到与 UI 走法对应的 shakmaty 走法
    fn find_legal(&self, mv: Move) -> Option<shakmaty::Move> {
        self.position.legal_moves().into_iter().find(|candidate| {
            ui_squares(candidate) == Some((mv.from, mv.to))
                && candidate.promotion().map(kind_from_role) == mv.promotion
        })
    }
}

/// UI 坐标下的起点和终点，王车易位按王的落点计算
fn ui_squares(m: &shakmaty::Move) -> Option<(Square, Square)> {
    match m {
        shakmaty::Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() { 6 } else { 2 };
            let to = Square::new(file, u32::from(king.rank()) as u8)?;
            Some((to_square(*king), to))
        }
        other => Some((to_square(other.from()?), to_square(other.to()))),
    }
}

fn to_square(sq: shakmaty::Square) -> Square {
    // shakmaty 与本库使用相同的 a1 = 0 索引
    Square::new_unchecked(u32::from(sq) as u8)
}

fn from_square(square: Square) -> shakmaty::Square {
    shakmaty::Square::new(square.index() as u32)
}

fn kind_from_role(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

fn color_from(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

impl RulesEngine for StandardRules {
    fn load_fen(&mut self, fen: &str) -> Result<()> {
        // 先解析到新局面，成功后才替换
        let position = Self::parse(fen)?;
        self.position = position;
        self.undo_stack.clear();
        self.repetitions.clear();
        self.repetitions.push(self.repetition_key());
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    fn turn(&self) -> Color {
        color_from(self.position.turn())
    }

    fn legal_moves(&self, from: Square) -> Vec<Square> {
        let mut targets: Vec<Square> = self
            .position
            .legal_moves()
            .iter()
            .filter_map(ui_squares)
            .filter(|(origin, _)| *origin == from)
            .map(|(_, to)| to)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    fn make_move(&mut self, mv: Move) -> Option<MoveRecord> {
        let candidate = self.find_legal(mv)?;
        let piece = self.piece_at(mv.from)?;
        let captured = match &candidate {
            shakmaty::Move::EnPassant { .. } => {
                Some(Piece::new(PieceKind::Pawn, piece.color.opponent()))
            }
            other => other
                .capture()
                .map(|role| Piece::new(kind_from_role(role), piece.color.opponent())),
        };
        let san = San::from_move(&self.position, &candidate).to_string();

        let previous = self.position.clone();
        self.position.play_unchecked(&candidate);
        self.undo_stack.push((previous, mv));
        self.repetitions.push(self.repetition_key());

        tracing::debug!("走法已执行: {} ({})", mv, san);
        Some(MoveRecord {
            from: mv.from,
            to: mv.to,
            piece,
            captured,
            promotion: mv.promotion,
            san,
        })
    }

    fn undo(&mut self) -> Option<Move> {
        let (previous, mv) = self.undo_stack.pop()?;
        self.position = previous;
        self.repetitions.pop();
        Some(mv)
    }

    fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position
            .board()
            .piece_at(from_square(square))
            .map(|p| Piece::new(kind_from_role(p.role), color_from(p.color)))
    }

    fn is_check(&self) -> bool {
        self.position.is_check()
    }

    fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    fn is_stalemate(&self) -> bool {
        self.position.is_stalemate()
    }

    fn is_insufficient_material(&self) -> bool {
        self.position.is_insufficient_material()
    }

    fn is_threefold_repetition(&self) -> bool {
        let Some(current) = self.repetitions.last() else {
            return false;
        };
        self.repetitions.iter().filter(|key| *key == current).count() >= 3
    }

    fn is_draw(&self) -> bool {
        self.is_stalemate()
            || self.is_insufficient_material()
            || self.is_threefold_repetition()
            || self.position.halfmoves() >= FIFTY_MOVE_HALFMOVES
    }
}
