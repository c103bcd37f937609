//! 棋子动画
//!
//! 变换单元只由渲染域写入；动画结束通过 oneshot 通知等待方，
//! 这样应用域可以把一次动画当作 future 来等待。

use std::time::Duration;

use tokio::sync::oneshot;

use crate::geometry::Point;

/// 动画结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// 正常播放完毕
    Finished,
    /// 被新的动画或重新挂载打断
    Interrupted,
}

/// 移动补间
#[derive(Debug, Clone, PartialEq)]
pub struct MoveTween {
    pub start: Point,
    pub end: Point,
    pub duration: Duration,
    pub elapsed: Duration,
}

impl MoveTween {
    pub fn new(start: Point, end: Point, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
            elapsed: Duration::ZERO,
        }
    }

    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn current_position(&self) -> Point {
        // ease-out 缓动
        let t = self.progress();
        let eased = 1.0 - (1.0 - t).powi(3);
        self.start.lerp(self.end, eased)
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// 可动画的平移量
#[derive(Debug, Default)]
pub struct AnimatedTransform {
    value: Point,
    tween: Option<MoveTween>,
    waiters: Vec<oneshot::Sender<AnimationOutcome>>,
}

impl AnimatedTransform {
    pub fn new(value: Point) -> Self {
        Self {
            value,
            tween: None,
            waiters: Vec::new(),
        }
    }

    /// 当前平移量
    pub fn value(&self) -> Point {
        self.value
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// 动画终点
    pub fn target(&self) -> Option<Point> {
        self.tween.as_ref().map(|tween| tween.end)
    }

    /// 立即跳到指定位置，打断进行中的动画
    pub fn set(&mut self, value: Point) {
        self.interrupt();
        self.value = value;
    }

    /// 从当前位置补间到终点，下一帧开始推进
    pub fn animate_to(&mut self, end: Point, duration: Duration) {
        self.interrupt();
        self.tween = Some(MoveTween::new(self.value, end, duration));
    }

    /// 登记等待方，当前没有动画时立即视为完成
    pub fn notify(&mut self, waiter: oneshot::Sender<AnimationOutcome>) {
        if self.tween.is_some() {
            self.waiters.push(waiter);
        } else {
            let _ = waiter.send(AnimationOutcome::Finished);
        }
    }

    /// 推进一帧，动画在本帧结束时返回 true
    pub fn advance(&mut self, delta: Duration) -> bool {
        let Some(tween) = self.tween.as_mut() else {
            return false;
        };
        tween.elapsed += delta;
        self.value = tween.current_position();
        if !tween.is_finished() {
            return false;
        }

        self.tween = None;
        self.resolve(AnimationOutcome::Finished);
        true
    }

    /// 打断进行中的动画
    pub fn interrupt(&mut self) {
        if self.tween.take().is_some() {
            self.resolve(AnimationOutcome::Interrupted);
        }
    }

    fn resolve(&mut self, outcome: AnimationOutcome) {
        for waiter in self.waiters.drain(..) {
            // 等待方可能已放弃
            let _ = waiter.send(outcome);
        }
    }
}
