//! 交互式国际象棋棋盘引擎
//!
//! 两个调度域协同工作：
//! - 渲染域：棋子变换、拖拽手势、高亮层，按帧推进动画
//! - 应用域：规则引擎与棋盘矩阵，校验并提交走法
//!
//! 两者只通过消息通信，动画以 future 的形式暴露给应用域等待。

pub mod animation;
pub mod app;
pub mod chessboard;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod highlight;
pub mod interaction;
pub mod modes;
pub mod navigation;
pub mod registry;
pub mod render;
pub mod theme;

pub use chessboard::Chessboard;
pub use config::{BoardConfig, Orientation};
pub use coordinator::{MoveSource, ProposeOutcome};
pub use error::{EngineError, Result};
pub use gesture::PointerEvent;
pub use interaction::{FnListener, MoveListener};
pub use modes::{exercise_board, game_board, visualization_board, ModeConfig, ModeKind};
pub use navigation::{NavigationRequest, NavigationStatus};
pub use render::{RenderEvent, RenderSnapshot};
pub use theme::{Palette, Rgba};
