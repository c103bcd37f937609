//! 棋谱与局面缓存
//!
//! 导航控制器的只读输入：有序走法列表，以及按半回合索引的 FEN 缓存。
//! 第 0 个半回合即初始局面。

use serde::{Deserialize, Serialize};

use crate::constants::INITIAL_FEN;
use crate::error::{ChessError, Result};
use crate::moves::{Move, MoveRecord};
use crate::piece::Square;
use crate::rules::RulesEngine;

/// 走法历史
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HistoryData")]
pub struct MoveHistory {
    /// 走法列表，第 n 步通向半回合 n
    moves: Vec<MoveRecord>,
    /// FEN 缓存，长度 = moves.len() + 1
    fens: Vec<String>,
}

/// 反序列化的原始数据，经过 `MoveHistory::new` 校验
#[derive(Deserialize)]
struct HistoryData {
    moves: Vec<MoveRecord>,
    fens: Vec<String>,
}

impl TryFrom<HistoryData> for MoveHistory {
    type Error = ChessError;

    fn try_from(data: HistoryData) -> Result<Self> {
        Self::new(data.moves, data.fens)
    }
}

impl MoveHistory {
    /// 由现成数据创建，校验缓存长度
    pub fn new(moves: Vec<MoveRecord>, fens: Vec<String>) -> Result<Self> {
        if fens.len() != moves.len() + 1 {
            return Err(ChessError::HistoryMismatch {
                moves: moves.len(),
                fens: fens.len(),
            });
        }
        Ok(Self { moves, fens })
    }

    /// 从初始局面依次执行走法，生成完整缓存
    ///
    /// 会改动传入的规则引擎，结束时停在最后一步之后。
    pub fn build(rules: &mut dyn RulesEngine, initial_fen: &str, moves: &[Move]) -> Result<Self> {
        rules.load_fen(initial_fen)?;
        let mut records = Vec::with_capacity(moves.len());
        let mut fens = Vec::with_capacity(moves.len() + 1);
        fens.push(rules.fen());

        for mv in moves {
            let record = rules.make_move(*mv).ok_or_else(|| ChessError::IllegalMove {
                from: mv.from.to_string(),
                to: mv.to.to_string(),
            })?;
            records.push(record);
            fens.push(rules.fen());
        }

        Ok(Self {
            moves: records,
            fens,
        })
    }

    /// 从 UCI 文本构建
    pub fn from_uci(rules: &mut dyn RulesEngine, initial_fen: &str, uci: &[&str]) -> Result<Self> {
        let moves = uci
            .iter()
            .map(|text| text.parse::<Move>())
            .collect::<Result<Vec<_>>>()?;
        Self::build(rules, initial_fen, &moves)
    }

    /// 走法数量
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// 所有走法
    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    /// 通向半回合 `ply` 的那一步（ply 从 1 开始）
    pub fn move_to_ply(&self, ply: usize) -> Option<&MoveRecord> {
        ply.checked_sub(1).and_then(|i| self.moves.get(i))
    }

    /// 半回合 `ply` 之后的局面
    pub fn fen_at(&self, ply: usize) -> Option<&str> {
        self.fens.get(ply).map(String::as_str)
    }

    /// 初始局面
    pub fn initial_fen(&self) -> &str {
        self.fens.first().map(String::as_str).unwrap_or(INITIAL_FEN)
    }

    /// 半回合 `ply` 的最后一步起止格，用于高亮
    pub fn last_move_at(&self, ply: usize) -> Option<(Square, Square)> {
        self.move_to_ply(ply).map(|record| (record.from, record.to))
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 带回合数的记谱文本，例如 `1. e4 e5 2. Nf3`
    pub fn to_move_text(&self) -> String {
        let mut output = String::new();
        for (i, record) in self.moves.iter().enumerate() {
            if i % 2 == 0 {
                if i > 0 {
                    output.push(' ');
                }
                output.push_str(&format!("{}. {}", i / 2 + 1, record.san));
            } else {
                output.push_str(&format!(" {}", record.san));
            }
        }
        output
    }
}
