//! 棋盘常量定义

use std::time::Duration;

/// 棋盘边长（行数 = 列数）
pub const BOARD_SIZE: usize = 8;

/// 格子总数
pub const SQUARE_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// 标准初始局面
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// 默认走子动画时长（毫秒）
pub const DEFAULT_MOVE_DURATION_MS: u64 = 60;

/// 渲染帧间隔（约 60 FPS）
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// 导航请求防抖时长，一帧
pub const NAVIGATION_DEBOUNCE: Duration = Duration::from_millis(16);

/// 前进回放时相邻两步之间的停顿
pub const REPLAY_STEP_DELAY: Duration = Duration::from_millis(20);

/// 回放前重置局面后的等待时间
pub const RESET_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// 拖拽激活距离（像素）
pub const DEFAULT_DRAG_ACTIVATION_DISTANCE: f32 = 2.0;

/// 默认棋盘像素尺寸
pub const DEFAULT_BOARD_PIXELS: f32 = 320.0;

/// 50 回合规则对应的半回合数
pub const FIFTY_MOVE_HALFMOVES: u32 = 100;
