//! 棋盘配置模块
//!
//! 提供配置数据结构与 JSON 持久化

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use board_core::{DEFAULT_BOARD_PIXELS, DEFAULT_DRAG_ACTIVATION_DISTANCE, DEFAULT_MOVE_DURATION_MS};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::geometry::BoardGeometry;
use crate::theme::Palette;

/// 棋盘朝向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// 白方在下
    #[default]
    White,
    /// 黑方在下，坐标旋转 180 度
    Black,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::White => Orientation::Black,
            Orientation::Black => Orientation::White,
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Orientation::White),
            "black" | "b" => Ok(Orientation::Black),
            other => Err(format!("unknown orientation: {}", other)),
        }
    }
}

/// 棋盘配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// 棋盘边长（像素）
    pub board_size: f32,
    /// 朝向
    pub orientation: Orientation,
    /// 走子动画时长（毫秒）
    pub move_duration_ms: u64,
    /// 显示坐标标签
    pub show_coordinates: bool,
    /// 拖拽激活距离（像素）
    pub drag_activation_distance: f32,
    /// 配色
    pub palette: Palette,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_PIXELS,
            orientation: Orientation::default(),
            move_duration_ms: DEFAULT_MOVE_DURATION_MS,
            show_coordinates: true,
            drag_activation_distance: DEFAULT_DRAG_ACTIVATION_DISTANCE,
            palette: Palette::classic(),
        }
    }
}

impl BoardConfig {
    /// 由容器宽度推导棋盘尺寸，宽度无效时保持默认
    pub fn from_container(width: f32) -> Self {
        let mut config = Self::default();
        if width.is_finite() && width > 0.0 {
            config.board_size = width.floor();
        }
        config
    }

    /// 走子动画时长
    pub fn move_duration(&self) -> Duration {
        Duration::from_millis(self.move_duration_ms)
    }

    /// 对应的几何换算
    pub fn geometry(&self) -> BoardGeometry {
        BoardGeometry::new(self.board_size, self.orientation)
    }

    /// 获取配置文件路径
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("chess-trainer");
            path.push("board.json");
            path
        })
    }

    /// 从默认路径加载，任何问题都回退到默认配置
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            tracing::warn!("无法获取配置目录，使用默认棋盘配置");
            return Self::default();
        };

        if !path.exists() {
            tracing::info!("棋盘配置文件不存在，使用默认配置");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("已加载棋盘配置: {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("棋盘配置无效: {}，使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 保存到默认路径
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(EngineError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// 保存到指定文件，目录不存在时创建
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("棋盘配置已保存: {:?}", path);
        Ok(())
    }
}
