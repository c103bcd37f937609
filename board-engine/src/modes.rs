//! 棋盘模式
//!
//! 三种模式只是同一组控制器的不同配置：
//! - 练习：可走子，无导航，显示自定义高亮
//! - 对局：可走子，可导航，自动高亮最后一步
//! - 演示：不可走子，只能导航

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use board_core::{RulesEngine, Square};
use serde::{Deserialize, Serialize};

use crate::chessboard::Chessboard;
use crate::config::BoardConfig;
use crate::interaction::MoveListener;

/// 模式类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Exercise,
    Game,
    Visualization,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModeKind::Exercise => "exercise",
            ModeKind::Game => "game",
            ModeKind::Visualization => "visualization",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exercise" => Ok(ModeKind::Exercise),
            "game" => Ok(ModeKind::Game),
            "visualization" => Ok(ModeKind::Visualization),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// 模式配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeConfig {
    pub kind: ModeKind,
    /// 是否允许拖拽和点击走子
    pub gestures_enabled: bool,
    /// 是否启用导航控制器
    pub navigation: bool,
    /// 导航后自动高亮最后一步
    pub auto_highlight_last_move: bool,
    pub custom_highlights: Vec<Square>,
}

impl ModeConfig {
    pub fn exercise(custom_highlights: Vec<Square>) -> Self {
        Self {
            kind: ModeKind::Exercise,
            gestures_enabled: true,
            navigation: false,
            auto_highlight_last_move: false,
            custom_highlights,
        }
    }

    pub fn game() -> Self {
        Self {
            kind: ModeKind::Game,
            gestures_enabled: true,
            navigation: true,
            auto_highlight_last_move: true,
            custom_highlights: Vec::new(),
        }
    }

    pub fn visualization() -> Self {
        Self {
            kind: ModeKind::Visualization,
            gestures_enabled: false,
            navigation: true,
            auto_highlight_last_move: true,
            custom_highlights: Vec::new(),
        }
    }

    pub fn for_kind(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Exercise => Self::exercise(Vec::new()),
            ModeKind::Game => Self::game(),
            ModeKind::Visualization => Self::visualization(),
        }
    }
}

/// 练习棋盘：显示自定义高亮
pub fn exercise_board(
    config: BoardConfig,
    rules: Box<dyn RulesEngine>,
    listener: Arc<dyn MoveListener>,
    custom_highlights: Vec<Square>,
) -> Chessboard {
    Chessboard::mount(config, ModeConfig::exercise(custom_highlights), rules, Some(listener))
}

/// 对局棋盘：走子与导航并存，回调可以拒绝走法
pub fn game_board(config: BoardConfig, rules: Box<dyn RulesEngine>, listener: Arc<dyn MoveListener>) -> Chessboard {
    Chessboard::mount(config, ModeConfig::game(), rules, Some(listener))
}

/// 演示棋盘：只能导航
pub fn visualization_board(config: BoardConfig, rules: Box<dyn RulesEngine>) -> Chessboard {
    Chessboard::mount(config, ModeConfig::visualization(), rules, None)
}
