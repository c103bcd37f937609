//! 渲染域
//!
//! 独立任务，独占 64 个棋子精灵（变换、启用标志、手势状态）与 64 个高亮层。
//! 只在有动画或有帧等待方时按 16ms 推进帧，其余时间只处理命令。

use std::collections::BTreeMap;
use std::time::Duration;

use board_core::{BoardMatrix, Color, Move, Piece, Square, FRAME_INTERVAL, SQUARE_COUNT};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::animation::{AnimatedTransform, AnimationOutcome};
use crate::app::AppHandle;
use crate::config::BoardConfig;
use crate::coordinator::MoveSource;
use crate::error::{EngineError, Result};
use crate::geometry::{BoardGeometry, Point};
use crate::gesture::{ActiveGesture, GestureGate, GestureState, GestureTracker, PointerEvent, PointerPhase, Release};
use crate::theme::{Palette, Rgba};

/// 选中棋子时的放大比例
const LIFT_SCALE: f32 = 1.2;

/// 应用域同步过来的选择状态镜像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMirror {
    pub turn: Color,
    pub selected: Option<Square>,
    /// 选中棋子的合法目标格
    pub targets: Vec<Square>,
}

impl Default for SelectionMirror {
    fn default() -> Self {
        Self {
            turn: Color::White,
            selected: None,
            targets: Vec::new(),
        }
    }
}

impl SelectionMirror {
    /// 指定格子上棋子可去的格子，选择尚未同步到该格时为 None
    pub fn targets_for(&self, square: Square) -> Option<&[Square]> {
        (self.selected == Some(square)).then_some(self.targets.as_slice())
    }
}

/// 渲染域命令
#[derive(Debug)]
pub enum RenderCommand {
    /// 挂载棋盘矩阵，所有变换回到各自格子
    Mount { board: BoardMatrix },
    /// 动画移动棋子，结束后回复
    MoveTo {
        from: Square,
        to: Square,
        done: oneshot::Sender<AnimationOutcome>,
    },
    SetEnabled { square: Square, enabled: bool },
    Highlight { square: Square, color: Option<Rgba> },
    ResetHighlight { square: Square },
    /// 新一轮高亮调和开始，更早的批次作废
    BeginHighlights { generation: u64 },
    /// 应用一轮调和的结果，批次过期时丢弃
    ApplyHighlights {
        generation: u64,
        set: BTreeMap<Square, Rgba>,
    },
    QueryHighlight { square: Square, reply: oneshot::Sender<bool> },
    Highlights { reply: oneshot::Sender<BTreeMap<Square, Rgba>> },
    SyncSelection(SelectionMirror),
    SetPromotionPending(bool),
    SetGesturesEnabled(bool),
    Pointer(PointerEvent),
    /// 应用域对松手落点的裁决
    ResolveRelease { from: Square, to: Square, legal: bool },
    /// 下一帧结束时回复
    NextFrame { reply: oneshot::Sender<()> },
    Snapshot { reply: oneshot::Sender<RenderSnapshot> },
    /// 回复此刻是否空闲（没有动画、没有帧等待方、没有待裁决的松手）
    Barrier { reply: oneshot::Sender<bool> },
}

/// 渲染事件，用于观察动画顺序
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Mounted { pieces: usize },
    MoveStarted { from: Square, to: Square },
    MoveFinished { from: Square, to: Square, outcome: AnimationOutcome },
    DragStarted { square: Square },
    SnappedBack { square: Square },
    Highlighted { square: Square, color: Rgba },
    HighlightCleared { square: Square },
}

/// 单个精灵的只读视图
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSnapshot {
    pub square: Square,
    pub piece: Option<Piece>,
    pub translation: Point,
    pub scale: f32,
    pub enabled: bool,
    pub gesture: GestureState,
    pub animating: bool,
}

/// 渲染域的只读快照
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub sprites: Vec<SpriteSnapshot>,
    pub highlights: BTreeMap<Square, Rgba>,
    pub selection: SelectionMirror,
    pub gestures_enabled: bool,
    pub promotion_pending: bool,
}

impl RenderSnapshot {
    pub fn sprite(&self, square: Square) -> &SpriteSnapshot {
        &self.sprites[square.index()]
    }

    /// 已高亮的格子，按索引排序
    pub fn highlighted_squares(&self) -> Vec<Square> {
        self.highlights.keys().copied().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.sprites.iter().all(|sprite| !sprite.animating)
    }
}

/// 渲染域句柄
#[derive(Debug, Clone)]
pub struct RenderHandle {
    tx: mpsc::UnboundedSender<RenderCommand>,
}

impl RenderHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RenderCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 渲染域自身持有的弱引用，不阻止通道关闭
    pub fn downgrade(&self) -> mpsc::WeakUnboundedSender<RenderCommand> {
        self.tx.downgrade()
    }

    pub fn send(&self, command: RenderCommand) {
        if self.tx.send(command).is_err() {
            tracing::trace!("渲染域已关闭，丢弃命令");
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> RenderCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .map_err(|_| EngineError::DomainClosed { domain: "render" })?;
        rx.await.map_err(|_| EngineError::DomainClosed { domain: "render" })
    }

    pub fn mount(&self, board: BoardMatrix) {
        self.send(RenderCommand::Mount { board });
    }

    /// 动画移动，渲染域关闭时视为被打断
    pub async fn move_to(&self, from: Square, to: Square) -> AnimationOutcome {
        self.request(|done| RenderCommand::MoveTo { from, to, done })
            .await
            .unwrap_or(AnimationOutcome::Interrupted)
    }

    pub fn set_enabled(&self, square: Square, enabled: bool) {
        self.send(RenderCommand::SetEnabled { square, enabled });
    }

    pub fn highlight(&self, square: Square, color: Option<Rgba>) {
        self.send(RenderCommand::Highlight { square, color });
    }

    pub fn reset_highlight(&self, square: Square) {
        self.send(RenderCommand::ResetHighlight { square });
    }

    pub fn begin_highlights(&self, generation: u64) {
        self.send(RenderCommand::BeginHighlights { generation });
    }

    pub fn apply_highlights(&self, generation: u64, set: BTreeMap<Square, Rgba>) {
        self.send(RenderCommand::ApplyHighlights { generation, set });
    }

    pub async fn is_highlighted(&self, square: Square) -> bool {
        self.request(|reply| RenderCommand::QueryHighlight { square, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn highlights(&self) -> Result<BTreeMap<Square, Rgba>> {
        self.request(|reply| RenderCommand::Highlights { reply }).await
    }

    pub fn sync_selection(&self, mirror: SelectionMirror) {
        self.send(RenderCommand::SyncSelection(mirror));
    }

    pub fn set_promotion_pending(&self, pending: bool) {
        self.send(RenderCommand::SetPromotionPending(pending));
    }

    pub fn set_gestures_enabled(&self, enabled: bool) {
        self.send(RenderCommand::SetGesturesEnabled(enabled));
    }

    pub fn pointer(&self, event: PointerEvent) {
        self.send(RenderCommand::Pointer(event));
    }

    /// 等待下一帧
    pub async fn next_frame(&self) -> Result<()> {
        self.request(|reply| RenderCommand::NextFrame { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RenderSnapshot> {
        self.request(|reply| RenderCommand::Snapshot { reply }).await
    }

    pub async fn barrier(&self) -> Result<bool> {
        self.request(|reply| RenderCommand::Barrier { reply }).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MotionKind {
    /// 注册表发起的移动
    Programmatic,
    /// 拖拽松手后滑向目标
    Commit,
    SnapBack,
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    to: Square,
    kind: MotionKind,
}

#[derive(Debug)]
struct Sprite {
    piece: Option<Piece>,
    transform: AnimatedTransform,
    scale: f32,
    enabled: bool,
    gesture: GestureState,
    motion: Option<Motion>,
}

/// 渲染循环
pub struct RenderLoop {
    geometry: BoardGeometry,
    palette: Palette,
    move_duration: Duration,
    drag_activation_distance: f32,
    sprites: Vec<Sprite>,
    overlays: Vec<Option<Rgba>>,
    /// 最近一轮高亮调和的批次号
    highlight_generation: u64,
    selection: SelectionMirror,
    gestures_enabled: bool,
    promotion_pending: bool,
    tracker: GestureTracker,
    frame_waiters: Vec<oneshot::Sender<()>>,
    last_frame: Instant,
    /// 等待应用域裁决的松手数量
    validating: usize,
    resolver: mpsc::WeakUnboundedSender<RenderCommand>,
    app: AppHandle,
    events: broadcast::Sender<RenderEvent>,
    rx: mpsc::UnboundedReceiver<RenderCommand>,
}

impl RenderLoop {
    pub fn new(
        config: &BoardConfig,
        gestures_enabled: bool,
        render: &RenderHandle,
        app: AppHandle,
        events: broadcast::Sender<RenderEvent>,
        rx: mpsc::UnboundedReceiver<RenderCommand>,
    ) -> Self {
        let geometry = config.geometry();
        let sprites = Square::all()
            .map(|square| Sprite {
                piece: None,
                transform: AnimatedTransform::new(geometry.to_translation(square)),
                scale: 1.0,
                enabled: true,
                gesture: GestureState::Idle,
                motion: None,
            })
            .collect();

        Self {
            geometry,
            palette: config.palette.clone(),
            move_duration: config.move_duration(),
            drag_activation_distance: config.drag_activation_distance,
            sprites,
            overlays: vec![None; SQUARE_COUNT],
            highlight_generation: 0,
            selection: SelectionMirror::default(),
            gestures_enabled,
            promotion_pending: false,
            tracker: GestureTracker::default(),
            frame_waiters: Vec::new(),
            last_frame: Instant::now(),
            validating: 0,
            resolver: render.downgrade(),
            app,
            events,
            rx,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!("渲染域已启动");
        loop {
            let needs_frame = self.needs_frame();
            let deadline = self.last_frame + FRAME_INTERVAL;
            tokio::select! {
                command = self.rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command);
                    if !needs_frame && self.needs_frame() {
                        // 从空闲进入动画，帧时钟从现在算起
                        self.last_frame = Instant::now();
                    }
                }
                _ = time::sleep_until(deadline), if needs_frame => self.tick(),
            }
        }
        tracing::debug!("渲染域已停止");
    }

    fn needs_frame(&self) -> bool {
        !self.frame_waiters.is_empty() || self.sprites.iter().any(|s| s.transform.is_animating())
    }

    fn emit(&self, event: RenderEvent) {
        // 没有订阅者时忽略
        let _ = self.events.send(event);
    }

    fn handle(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::Mount { board } => self.mount(&board),
            RenderCommand::MoveTo { from, to, done } => self.move_piece(from, to, done),
            RenderCommand::SetEnabled { square, enabled } => {
                self.sprites[square.index()].enabled = enabled;
            }
            RenderCommand::Highlight { square, color } => {
                let color = color.unwrap_or(self.palette.last_move_highlight);
                self.overlays[square.index()] = Some(color);
                self.emit(RenderEvent::Highlighted { square, color });
            }
            RenderCommand::ResetHighlight { square } => {
                if self.overlays[square.index()].take().is_some() {
                    self.emit(RenderEvent::HighlightCleared { square });
                }
            }
            RenderCommand::BeginHighlights { generation } => {
                self.highlight_generation = self.highlight_generation.max(generation);
            }
            RenderCommand::ApplyHighlights { generation, set } => {
                if generation < self.highlight_generation {
                    tracing::trace!("丢弃过期的高亮批次 {}", generation);
                    return;
                }
                for (square, color) in set {
                    self.overlays[square.index()] = Some(color);
                    self.emit(RenderEvent::Highlighted { square, color });
                }
            }
            RenderCommand::QueryHighlight { square, reply } => {
                let _ = reply.send(self.overlays[square.index()].is_some());
            }
            RenderCommand::Highlights { reply } => {
                let _ = reply.send(self.highlight_map());
            }
            RenderCommand::SyncSelection(mirror) => self.sync_selection(mirror),
            RenderCommand::SetPromotionPending(pending) => {
                self.promotion_pending = pending;
            }
            RenderCommand::SetGesturesEnabled(enabled) => {
                self.gestures_enabled = enabled;
            }
            RenderCommand::Pointer(event) => self.on_pointer(event),
            RenderCommand::ResolveRelease { from, to, legal } => self.resolve_release(from, to, legal),
            RenderCommand::NextFrame { reply } => self.frame_waiters.push(reply),
            RenderCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RenderCommand::Barrier { reply } => {
                let _ = reply.send(!self.needs_frame() && self.validating == 0);
            }
        }
    }

    fn mount(&mut self, board: &BoardMatrix) {
        if let Some(gesture) = self.tracker.clear() {
            tracing::debug!("重新挂载，放弃 {} 上的手势", gesture.square);
        }
        for square in Square::all() {
            let translation = self.geometry.to_translation(square);
            let sprite = &mut self.sprites[square.index()];
            sprite.piece = board.get(square);
            sprite.transform.set(translation);
            sprite.scale = 1.0;
            sprite.enabled = true;
            sprite.gesture = GestureState::Idle;
            sprite.motion = None;
        }
        self.emit(RenderEvent::Mounted {
            pieces: board.piece_count(),
        });
    }

    fn move_piece(&mut self, from: Square, to: Square, done: oneshot::Sender<AnimationOutcome>) {
        let target = self.geometry.to_translation(to);
        let duration = self.move_duration;
        let sprite = &mut self.sprites[from.index()];
        if sprite.piece.is_none() {
            tracing::warn!("{} 上没有棋子，无法移动", from);
            let _ = done.send(AnimationOutcome::Interrupted);
            return;
        }

        sprite.transform.animate_to(target, duration);
        sprite.transform.notify(done);
        sprite.motion = Some(Motion {
            to,
            kind: MotionKind::Programmatic,
        });
        self.emit(RenderEvent::MoveStarted { from, to });
    }

    fn sync_selection(&mut self, mirror: SelectionMirror) {
        for (index, sprite) in self.sprites.iter_mut().enumerate() {
            let selected = mirror.selected.map(|s| s.index()) == Some(index);
            match sprite.gesture {
                GestureState::Armed if !selected => {
                    sprite.gesture = GestureState::Idle;
                    sprite.scale = 1.0;
                }
                GestureState::Idle if selected && sprite.piece.is_some() => {
                    sprite.gesture = GestureState::Armed;
                }
                _ => {}
            }
        }
        self.selection = mirror;
    }

    fn on_pointer(&mut self, event: PointerEvent) {
        match event.phase {
            PointerPhase::Down => self.pointer_down(event),
            PointerPhase::Move => self.pointer_move(event),
            PointerPhase::Up => self.pointer_up(event),
            PointerPhase::Cancel => self.pointer_cancel(event),
        }
    }

    fn pointer_down(&mut self, event: PointerEvent) {
        if self.tracker.is_active() {
            tracing::trace!("已有手势进行中，忽略指针 {:?}", event.pointer);
            return;
        }
        if !self.gestures_enabled || self.promotion_pending {
            return;
        }
        let Some(square) = self.geometry.square_at(event.position) else {
            return;
        };

        let sprite = &self.sprites[square.index()];
        let origin = sprite.transform.value();
        let piece = sprite.piece.filter(|_| !sprite.gesture.is_settling());
        let armed = match piece {
            Some(piece) => {
                let gate = GestureGate {
                    gestures_enabled: self.gestures_enabled,
                    promotion_pending: self.promotion_pending,
                    piece_enabled: sprite.enabled,
                    is_turn: piece.color == self.selection.turn,
                };
                // 任何有子格的按下都交给应用域，用于选择或点击走子
                self.app.select_piece(square, self.selection.selected);
                gate.can_arm()
            }
            None => false,
        };

        if armed {
            let sprite = &mut self.sprites[square.index()];
            sprite.gesture = GestureState::Armed;
            sprite.scale = LIFT_SCALE;
        }
        self.tracker.begin(ActiveGesture::new(event.pointer, square, event.position, origin, armed));
    }

    fn pointer_move(&mut self, event: PointerEvent) {
        let distance = self.drag_activation_distance;
        let Some(gesture) = self.tracker.get_mut(event.pointer) else {
            return;
        };
        let was_dragging = gesture.dragging;
        let square = gesture.square;
        let Some(translation) = gesture.drag_to(event.position, distance) else {
            return;
        };

        let sprite = &mut self.sprites[square.index()];
        sprite.gesture = GestureState::Dragging;
        sprite.transform.set(translation);
        if !was_dragging {
            self.emit(RenderEvent::DragStarted { square });
        }
    }

    fn pointer_up(&mut self, event: PointerEvent) {
        let Some(gesture) = self.tracker.finish(event.pointer) else {
            return;
        };
        let square = gesture.square;

        if !gesture.armed {
            // 空格点击：尝试把已选中的棋子走过来
            if self.sprites[square.index()].piece.is_none() && self.selection.selected.is_some() {
                self.app.tap(square);
            }
            return;
        }

        let translation = self.sprites[square.index()].transform.value();
        let release = gesture.release(&self.geometry, translation, self.selection.targets_for(square));
        self.settle_release(square, gesture.origin, release);
    }

    fn pointer_cancel(&mut self, event: PointerEvent) {
        let Some(gesture) = self.tracker.finish(event.pointer) else {
            return;
        };
        if gesture.dragging {
            self.settle_release(gesture.square, gesture.origin, Release::SnapBack);
        }
    }

    fn settle_release(&mut self, square: Square, origin: Point, release: Release) {
        let duration = self.move_duration;
        let sprite = &mut self.sprites[square.index()];
        sprite.scale = 1.0;
        match release {
            Release::Tap { .. } => {
                // 保持选中，等待点击目标格
                sprite.gesture = GestureState::Armed;
            }
            Release::SnapBack => {
                sprite.gesture = GestureState::SnappingBack;
                sprite.motion = Some(Motion {
                    to: square,
                    kind: MotionKind::SnapBack,
                });
                sprite.transform.animate_to(origin, duration);
            }
            Release::Commit { to } => {
                sprite.gesture = GestureState::Committing { to };
                sprite.motion = Some(Motion {
                    to,
                    kind: MotionKind::Commit,
                });
                let target = self.geometry.to_translation(to);
                sprite.transform.animate_to(target, duration);
                self.emit(RenderEvent::MoveStarted { from: square, to });
            }
            Release::Validate { to } => {
                sprite.gesture = GestureState::Validating { to };
                self.validating += 1;
                let app = self.app.clone();
                let resolver = self.resolver.clone();
                tokio::spawn(async move {
                    let legal = match app.validate(square, to).await {
                        Ok(legal) => legal,
                        Err(e) => {
                            tracing::warn!("校验 {}{} 失败: {}", square, to, e);
                            false
                        }
                    };
                    if let Some(tx) = resolver.upgrade() {
                        let _ = tx.send(RenderCommand::ResolveRelease { from: square, to, legal });
                    }
                });
            }
        }
    }

    fn resolve_release(&mut self, from: Square, to: Square, legal: bool) {
        self.validating = self.validating.saturating_sub(1);
        if self.sprites[from.index()].gesture != (GestureState::Validating { to }) {
            // 等待期间重新挂载过
            return;
        }
        let origin = self.geometry.to_translation(from);
        let release = if legal { Release::Commit { to } } else { Release::SnapBack };
        self.settle_release(from, origin, release);
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;

        let mut finished = Vec::new();
        for (index, sprite) in self.sprites.iter_mut().enumerate() {
            if sprite.transform.advance(delta) {
                let motion = sprite.motion.take();
                if sprite.gesture.is_settling() {
                    sprite.gesture = GestureState::Idle;
                }
                if let (Some(square), Some(motion)) = (Square::from_index(index), motion) {
                    finished.push((square, motion));
                }
            }
        }

        for (from, motion) in finished {
            match motion.kind {
                MotionKind::Programmatic => self.emit(RenderEvent::MoveFinished {
                    from,
                    to: motion.to,
                    outcome: AnimationOutcome::Finished,
                }),
                MotionKind::Commit => {
                    self.emit(RenderEvent::MoveFinished {
                        from,
                        to: motion.to,
                        outcome: AnimationOutcome::Finished,
                    });
                    // 动画结束后才把走法交给应用域
                    self.app.propose_detached(Move::new(from, motion.to), MoveSource::User);
                }
                MotionKind::SnapBack => self.emit(RenderEvent::SnappedBack { square: from }),
            }
        }

        for waiter in self.frame_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn highlight_map(&self) -> BTreeMap<Square, Rgba> {
        Square::all()
            .filter_map(|square| self.overlays[square.index()].map(|color| (square, color)))
            .collect()
    }

    fn snapshot(&self) -> RenderSnapshot {
        let sprites = Square::all()
            .map(|square| {
                let sprite = &self.sprites[square.index()];
                SpriteSnapshot {
                    square,
                    piece: sprite.piece,
                    translation: sprite.transform.value(),
                    scale: sprite.scale,
                    enabled: sprite.enabled,
                    gesture: sprite.gesture,
                    animating: sprite.transform.is_animating(),
                }
            })
            .collect();

        RenderSnapshot {
            sprites,
            highlights: self.highlight_map(),
            selection: self.selection.clone(),
            gestures_enabled: self.gestures_enabled,
            promotion_pending: self.promotion_pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_loop() -> RenderHandle {
        let (render, rx) = RenderHandle::channel();
        let (app, _app_rx) = AppHandle::channel();
        let (events, _) = broadcast::channel(16);
        tokio::spawn(RenderLoop::new(&BoardConfig::default(), false, &render, app, events, rx).run());
        render
    }

    fn set(squares: &[&str], color: Rgba) -> BTreeMap<Square, Rgba> {
        squares.iter().map(|s| (s.parse().unwrap(), color)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_highlight_batch_is_dropped() {
        let render = spawn_loop();
        let color = Palette::classic().custom_highlight;

        // 第二轮的清空先于第一轮的应用到达
        render.begin_highlights(1);
        render.begin_highlights(2);
        render.apply_highlights(1, set(&["a1", "h8"], color));
        render.apply_highlights(2, set(&["d4"], color));

        let highlights = render.highlights().await.unwrap();
        assert_eq!(highlights.keys().map(ToString::to_string).collect::<Vec<_>>(), ["d4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_highlight_batch_applies() {
        let render = spawn_loop();
        let color = Palette::classic().selection_highlight;

        render.begin_highlights(3);
        render.apply_highlights(3, set(&["e2", "e4"], color));
        // 直接高亮不受批次限制
        render.highlight("c3".parse().unwrap(), None);

        let highlights = render.highlights().await.unwrap();
        assert_eq!(highlights.len(), 3);
        assert!(render.is_highlighted("e4".parse().unwrap()).await);
    }
}
