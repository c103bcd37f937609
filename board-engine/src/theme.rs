//! 主题和配色方案
//!
//! 定义棋盘格子、高亮层的颜色配置

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// RGBA 颜色，alpha 取 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Rgba {
    type Err = EngineError;

    /// 支持 `#RRGGBB` 与 `rgba(r, g, b, a)` 两种写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidColor {
            value: s.to_string(),
        };
        let s = s.trim();

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(invalid());
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            return Ok(Rgba::rgb(channel(0)?, channel(2)?, channel(4)?));
        }

        let inner = s
            .strip_prefix("rgba(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(invalid());
        }
        let channel = |i: usize| parts[i].parse::<u8>().map_err(|_| invalid());
        let alpha: f32 = parts[3].parse().map_err(|_| invalid())?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(invalid());
        }
        Ok(Rgba::rgba(channel(0)?, channel(1)?, channel(2)?, alpha))
    }
}

impl TryFrom<String> for Rgba {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

/// 棋盘配色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub name: String,

    // 棋盘
    pub light_square: Rgba,
    pub dark_square: Rgba,

    // 交互高亮
    pub last_move_highlight: Rgba,
    pub checkmate_highlight: Rgba,
    pub selection_highlight: Rgba,
    pub custom_highlight: Rgba,
}

impl Palette {
    /// 经典木质配色
    pub fn classic() -> Self {
        Self {
            name: "classic".to_string(),

            light_square: Rgba::rgb(240, 217, 181), // #F0D9B5
            dark_square: Rgba::rgb(181, 136, 99),   // #B58863

            last_move_highlight: Rgba::rgba(255, 255, 0, 0.4),
            checkmate_highlight: Rgba::rgb(232, 72, 85), // #E84855
            selection_highlight: Rgba::rgba(20, 85, 30, 0.5),
            custom_highlight: Rgba::rgba(255, 170, 0, 0.5),
        }
    }

    /// 高对比度配色
    pub fn high_contrast() -> Self {
        Self {
            name: "high-contrast".to_string(),

            light_square: Rgba::rgb(255, 255, 255),
            dark_square: Rgba::rgb(90, 90, 90),

            last_move_highlight: Rgba::rgba(0, 200, 83, 0.5),
            checkmate_highlight: Rgba::rgb(244, 67, 54),
            selection_highlight: Rgba::rgba(33, 150, 243, 0.6),
            custom_highlight: Rgba::rgba(255, 235, 59, 0.6),
        }
    }

    /// 按格子颜色取底色
    pub fn square_color(&self, file: u8, rank: u8) -> Rgba {
        if (file + rank) % 2 == 0 {
            self.dark_square
        } else {
            self.light_square
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::classic()
    }
}
