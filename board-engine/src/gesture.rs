//! 棋子拖拽手势
//!
//! 运行在渲染域的纯状态机：idle → armed → dragging → {snapping-back | committing}，
//! 终态动画结束后回到 idle。同一时刻只允许一个指针持有手势。

use board_core::Square;

use crate::geometry::{BoardGeometry, Point};

/// 指针标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub u64);

/// 指针事件阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// 指针事件，坐标为棋盘视图坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer: PointerId,
    pub phase: PointerPhase,
    pub position: Point,
}

impl PointerEvent {
    pub fn down(pointer: u64, position: Point) -> Self {
        Self::new(pointer, PointerPhase::Down, position)
    }

    pub fn moved(pointer: u64, position: Point) -> Self {
        Self::new(pointer, PointerPhase::Move, position)
    }

    pub fn up(pointer: u64, position: Point) -> Self {
        Self::new(pointer, PointerPhase::Up, position)
    }

    pub fn cancel(pointer: u64, position: Point) -> Self {
        Self::new(pointer, PointerPhase::Cancel, position)
    }

    fn new(pointer: u64, phase: PointerPhase, position: Point) -> Self {
        Self {
            pointer: PointerId(pointer),
            phase,
            position,
        }
    }
}

/// 单个棋子的手势状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// 已选中，等待拖动或点击目标格
    Armed,
    Dragging,
    /// 松手位置不合法，正在回到原格
    SnappingBack,
    /// 松手位置合法，正在滑向目标格
    Committing { to: Square },
    /// 松手时合法目标尚未同步，等待应用域校验
    Validating { to: Square },
}

impl GestureState {
    /// 是否处于终态动画中
    pub fn is_settling(&self) -> bool {
        matches!(
            self,
            GestureState::SnappingBack | GestureState::Committing { .. } | GestureState::Validating { .. }
        )
    }
}

/// 按下时的准入条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureGate {
    /// 宿主开关
    pub gestures_enabled: bool,
    /// 是否有升变等待选择
    pub promotion_pending: bool,
    /// 棋子自身是否可用
    pub piece_enabled: bool,
    /// 棋子颜色是否为当前走子方
    pub is_turn: bool,
}

impl GestureGate {
    pub fn can_arm(&self) -> bool {
        self.gestures_enabled && !self.promotion_pending && self.piece_enabled && self.is_turn
    }
}

/// 松手后的处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// 未拖动，视为点击
    Tap { square: Square },
    /// 回到原格，不通知协调器
    SnapBack,
    /// 滑到目标格后提交
    Commit { to: Square },
    /// 合法目标未知，交给应用域裁决
    Validate { to: Square },
}

/// 进行中的手势
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveGesture {
    pub pointer: PointerId,
    /// 按下的格子
    pub square: Square,
    /// 按下位置
    pub press: Point,
    /// 棋子按下时的平移量
    pub origin: Point,
    /// 是否武装了一枚棋子（空格按下只用于点击走子）
    pub armed: bool,
    pub dragging: bool,
}

impl ActiveGesture {
    pub fn new(pointer: PointerId, square: Square, press: Point, origin: Point, armed: bool) -> Self {
        Self {
            pointer,
            square,
            press,
            origin,
            armed,
            dragging: false,
        }
    }

    /// 指针移动，返回棋子新的平移量
    pub fn drag_to(&mut self, position: Point, activation_distance: f32) -> Option<Point> {
        if !self.armed {
            return None;
        }
        if !self.dragging && self.press.distance(position) < activation_distance {
            return None;
        }
        self.dragging = true;
        Some(self.origin + (position - self.press))
    }

    /// 松手：按棋子当前平移量判断落点，`targets` 为 None 表示合法目标尚未同步
    pub fn release(&self, geometry: &BoardGeometry, translation: Point, targets: Option<&[Square]>) -> Release {
        if !self.dragging {
            return Release::Tap {
                square: self.square,
            };
        }
        match geometry.square_for_translation(translation) {
            Some(to) if to != self.square => match targets {
                Some(targets) if targets.contains(&to) => Release::Commit { to },
                Some(_) => Release::SnapBack,
                None => Release::Validate { to },
            },
            _ => Release::SnapBack,
        }
    }
}

/// 手势持有者，保证同一时刻至多一个活动手势
#[derive(Debug, Default)]
pub struct GestureTracker {
    active: Option<ActiveGesture>,
}

impl GestureTracker {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// 开始新手势，已有其他指针持有时拒绝
    pub fn begin(&mut self, gesture: ActiveGesture) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(gesture);
        true
    }

    /// 指定指针持有的手势
    pub fn get_mut(&mut self, pointer: PointerId) -> Option<&mut ActiveGesture> {
        self.active.as_mut().filter(|g| g.pointer == pointer)
    }

    /// 结束指定指针的手势
    pub fn finish(&mut self, pointer: PointerId) -> Option<ActiveGesture> {
        if self.active.as_ref().is_some_and(|g| g.pointer == pointer) {
            self.active.take()
        } else {
            None
        }
    }

    /// 放弃进行中的手势（重新挂载时）
    pub fn clear(&mut self) -> Option<ActiveGesture> {
        self.active.take()
    }
}
