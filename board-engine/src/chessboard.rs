//! 棋盘句柄
//!
//! 挂载时启动渲染域与应用域两个任务，组合注册表、高亮、导航控制器，
//! 对宿主暴露命令式接口。句柄被丢弃时两个域随之停止。

use std::sync::Arc;

use board_core::{
    BoardMatrix, ChessboardState, Move, MoveRecord, PieceKind, RulesEngine, Square, FRAME_INTERVAL,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::app::{AppDomain, AppHandle};
use crate::config::BoardConfig;
use crate::coordinator::{BoardCoordinator, MoveSource, ProposeOutcome};
use crate::error::{EngineError, Result};
use crate::geometry::{BoardGeometry, CoordinateLabel};
use crate::gesture::PointerEvent;
use crate::highlight::{HighlightController, SharedHighlight};
use crate::interaction::{Interaction, MoveListener};
use crate::modes::ModeConfig;
use crate::navigation::{NavigationController, NavigationRequest, NavigationStatus};
use crate::registry::SquareRegistry;
use crate::render::{RenderEvent, RenderHandle, RenderLoop, RenderSnapshot};
use crate::theme::Rgba;

/// 渲染事件缓冲
const EVENT_CAPACITY: usize = 1024;

/// 已挂载的棋盘
pub struct Chessboard {
    config: BoardConfig,
    mode: ModeConfig,
    app: AppHandle,
    render: RenderHandle,
    registry: Arc<SquareRegistry>,
    highlight: SharedHighlight,
    navigation: Option<NavigationController>,
    events: broadcast::Sender<RenderEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Chessboard {
    /// 挂载棋盘，必须在 tokio 运行时中调用
    pub fn mount(
        config: BoardConfig,
        mode: ModeConfig,
        rules: Box<dyn RulesEngine>,
        listener: Option<Arc<dyn MoveListener>>,
    ) -> Self {
        let interaction = Interaction::new(listener, mode.gestures_enabled);

        let (render, render_rx) = RenderHandle::channel();
        let (app, app_rx) = AppHandle::channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let registry = Arc::new(SquareRegistry::new(render.clone(), app.clone()));
        let highlight = SharedHighlight::new(HighlightController::new(
            registry.clone(),
            render.clone(),
            config.palette.clone(),
        ));

        let render_loop = RenderLoop::new(
            &config,
            interaction.gestures_enabled(),
            &render,
            app.clone(),
            events.clone(),
            render_rx,
        );
        let coordinator = BoardCoordinator::new(
            rules,
            registry.clone(),
            render.clone(),
            highlight.clone(),
            interaction,
        );
        let tasks = vec![
            tokio::spawn(render_loop.run()),
            tokio::spawn(AppDomain::new(coordinator, app_rx).run()),
        ];

        let navigation = mode.navigation.then(|| {
            NavigationController::spawn(
                app.clone(),
                registry.clone(),
                highlight.clone(),
                mode.auto_highlight_last_move,
            )
        });

        if !mode.custom_highlights.is_empty() {
            let custom = mode.custom_highlights.clone();
            highlight.update(|inputs| inputs.custom = custom);
        }

        tracing::info!(
            "棋盘已挂载: 模式 {}，尺寸 {}，朝向 {:?}",
            mode.kind,
            config.board_size,
            config.orientation
        );

        Self {
            config,
            mode,
            app,
            render,
            registry,
            highlight,
            navigation,
            events,
            tasks,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    pub fn geometry(&self) -> BoardGeometry {
        self.config.geometry()
    }

    /// 坐标标签，配置关闭时为空
    pub fn coordinate_labels(&self) -> Vec<CoordinateLabel> {
        if self.config.show_coordinates {
            self.geometry().coordinate_labels()
        } else {
            Vec::new()
        }
    }

    pub fn registry(&self) -> &Arc<SquareRegistry> {
        &self.registry
    }

    /// 重置局面，不传 FEN 时回到初始局面
    pub async fn reset_board(&self, fen: Option<&str>) -> Result<()> {
        self.app.reset_board(fen.map(str::to_string)).await
    }

    /// 直接高亮一个格子，不指定颜色时使用最后一步颜色
    pub fn highlight(&self, square: Square, color: Option<Rgba>) {
        self.registry.overlay(square).highlight(color);
        self.highlight.invalidate();
    }

    pub fn reset_all_highlights(&self) {
        self.registry.reset_all_highlights();
        self.highlight.invalidate();
    }

    /// 替换自定义高亮格
    pub fn set_highlight_squares(&self, squares: Vec<Square>) {
        self.highlight.update(|inputs| inputs.custom = squares);
    }

    pub fn navigate_to_position(&self, request: NavigationRequest) -> Result<u64> {
        let navigation = self.navigation.as_ref().ok_or(EngineError::NavigationDisabled)?;
        Ok(navigation.navigate(request))
    }

    pub fn navigation_status(&self) -> Option<NavigationStatus> {
        self.navigation.as_ref().map(NavigationController::status)
    }

    pub async fn get_state(&self) -> Result<ChessboardState> {
        self.app.state().await
    }

    /// 按用户走法处理：动画、提交、回调
    pub async fn move_piece(&self, mv: Move) -> Option<MoveRecord> {
        self.registry
            .piece(mv.from)
            .move_to_with(mv.to, mv.promotion, MoveSource::User)
            .await
    }

    pub fn pointer(&self, event: PointerEvent) {
        self.render.pointer(event);
    }

    pub async fn choose_promotion(&self, kind: PieceKind) -> Result<ProposeOutcome> {
        self.app.choose_promotion(kind).await
    }

    pub async fn cancel_promotion(&self) -> Result<()> {
        self.app.cancel_promotion().await
    }

    pub async fn board(&self) -> Result<BoardMatrix> {
        self.app.board().await
    }

    pub async fn fen(&self) -> Result<String> {
        self.app.fen().await
    }

    /// 渲染域的只读快照
    pub async fn snapshot(&self) -> Result<RenderSnapshot> {
        self.render.snapshot().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.events.subscribe()
    }

    /// 等待两个域、导航与高亮全部空闲
    pub async fn settle(&self) -> Result<()> {
        loop {
            if let Some(navigation) = &self.navigation {
                navigation.wait_settled().await?;
            }
            let render_idle = self.render.barrier().await?;
            let app_idle = self.app.barrier().await?;
            let render_after = self.render.barrier().await?;
            if render_idle && app_idle && render_after && !self.highlight.is_pending() {
                return Ok(());
            }
            time::sleep(FRAME_INTERVAL).await;
        }
    }
}

impl Drop for Chessboard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::animation::AnimationOutcome;
    use crate::config::Orientation;
    use crate::gesture::GestureState;
    use crate::interaction::FnListener;
    use crate::theme::Palette;
    use board_core::{ChessError, Color, MoveHistory, Piece, StandardRules, INITIAL_FEN};

    const PROMOTION_FEN: &str = "8/4P3/8/8/8/8/k7/4K3 w - - 0 1";

    const TEN_MOVES: [&str; 10] = [
        "e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "d2d3", "f8c5", "e1g1", "e8g8",
    ];

    fn sq(label: &str) -> Square {
        label.parse().unwrap()
    }

    fn mv(uci: &str) -> Move {
        uci.parse().unwrap()
    }

    /// 记录所有走法，按 `accept` 决定是否接受
    fn recorder(accept: bool) -> (Arc<dyn MoveListener>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let listener = FnListener(move |record: &MoveRecord, _: &ChessboardState| -> anyhow::Result<bool> {
            log.lock().unwrap().push(record.san.clone());
            Ok(accept)
        });
        (Arc::new(listener), seen)
    }

    async fn mounted(mode: ModeConfig, fen: &str, listener: Option<Arc<dyn MoveListener>>) -> Chessboard {
        let rules = StandardRules::from_fen(fen).unwrap();
        let board = Chessboard::mount(BoardConfig::default(), mode, Box::new(rules), listener);
        board.settle().await.unwrap();
        board
    }

    async fn exercise(accept: bool) -> (Chessboard, Arc<Mutex<Vec<String>>>) {
        let (listener, seen) = recorder(accept);
        let board = mounted(ModeConfig::exercise(Vec::new()), INITIAL_FEN, Some(listener)).await;
        (board, seen)
    }

    async fn drag(board: &Chessboard, from: &str, to: &str) {
        let geometry = board.geometry();
        board.pointer(PointerEvent::down(1, geometry.centroid(sq(from))));
        board.settle().await.unwrap();
        board.pointer(PointerEvent::moved(1, geometry.centroid(sq(to))));
        board.pointer(PointerEvent::up(1, geometry.centroid(sq(to))));
        board.settle().await.unwrap();
    }

    async fn tap(board: &Chessboard, square: &str) {
        let point = board.geometry().centroid(sq(square));
        board.pointer(PointerEvent::down(1, point));
        board.pointer(PointerEvent::up(1, point));
        board.settle().await.unwrap();
    }

    fn history(moves: &[&str]) -> Arc<MoveHistory> {
        let mut rules = StandardRules::new();
        Arc::new(MoveHistory::from_uci(&mut rules, INITIAL_FEN, moves).unwrap())
    }

    async fn navigate(board: &Chessboard, history: &Arc<MoveHistory>, current: usize, target: usize) {
        board
            .navigate_to_position(NavigationRequest::new(history.clone(), current, target))
            .unwrap();
        board.settle().await.unwrap();
    }

    fn started_moves(rx: &mut broadcast::Receiver<RenderEvent>) -> Vec<(Square, Square)> {
        let mut moves = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RenderEvent::MoveStarted { from, to } = event {
                moves.push((from, to));
            }
        }
        moves
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_commits_move() {
        let (board, seen) = exercise(true).await;
        drag(&board, "e2", "e4").await;

        let matrix = board.board().await.unwrap();
        assert_eq!(matrix.get(sq("e4")), Some(Piece::new(PieceKind::Pawn, Color::White)));
        assert_eq!(matrix.get(sq("e2")), None);
        assert_eq!(seen.lock().unwrap().as_slice(), ["e4"]);

        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.highlighted_squares(), vec![sq("e2"), sq("e4")]);
        assert_eq!(snapshot.selection.turn, Color::Black);
        assert!(snapshot.is_idle());
        assert_eq!(snapshot.sprite(sq("e4")).translation, board.geometry().to_translation(sq("e4")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_move_is_rejected() {
        let (board, seen) = exercise(true).await;
        let before = board.board().await.unwrap();

        assert_eq!(board.move_piece(mv("e2e5")).await, None);
        board.settle().await.unwrap();

        assert_eq!(board.board().await.unwrap(), before);
        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        assert!(seen.lock().unwrap().is_empty());
        let snapshot = board.snapshot().await.unwrap();
        assert!(snapshot.highlights.is_empty());
        assert_eq!(snapshot.sprite(sq("e2")).translation, board.geometry().to_translation(sq("e2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_to_illegal_square_snaps_back() {
        let (board, _) = exercise(true).await;
        let mut events = board.subscribe();
        drag(&board, "e2", "e5").await;

        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        let snapshot = board.snapshot().await.unwrap();
        let sprite = snapshot.sprite(sq("e2"));
        assert_eq!(sprite.translation, board.geometry().to_translation(sq("e2")));
        assert_eq!(sprite.gesture, GestureState::Idle);

        let mut snapped = false;
        while let Ok(event) = events.try_recv() {
            snapped |= event == RenderEvent::SnappedBack { square: sq("e2") };
        }
        assert!(snapped);
    }

    /// 按下、拖动、松手一气呵成，中间不等待选择同步
    async fn flick(board: &Chessboard, from: &str, to: &str) {
        let geometry = board.geometry();
        board.pointer(PointerEvent::down(1, geometry.centroid(sq(from))));
        board.pointer(PointerEvent::moved(1, geometry.centroid(sq(to))));
        board.pointer(PointerEvent::up(1, geometry.centroid(sq(to))));
        board.settle().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flick_before_selection_sync_commits() {
        let (board, seen) = exercise(true).await;
        flick(&board, "g1", "f3").await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["Nf3"]);
        let matrix = board.board().await.unwrap();
        assert_eq!(matrix.get(sq("f3")), Some(Piece::new(PieceKind::Knight, Color::White)));
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.sprite(sq("f3")).translation, board.geometry().to_translation(sq("f3")));
        assert_eq!(snapshot.sprite(sq("g1")).gesture, GestureState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flick_to_illegal_square_snaps_back() {
        let (board, seen) = exercise(true).await;
        let mut events = board.subscribe();
        flick(&board, "e2", "e5").await;

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        let snapshot = board.snapshot().await.unwrap();
        let sprite = snapshot.sprite(sq("e2"));
        assert_eq!(sprite.translation, board.geometry().to_translation(sq("e2")));
        assert!(!sprite.gesture.is_settling());

        let mut snapped = false;
        while let Ok(event) = events.try_recv() {
            snapped |= event == RenderEvent::SnappedBack { square: sq("e2") };
        }
        assert!(snapped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_to_move() {
        let (board, seen) = exercise(true).await;
        tap(&board, "e2").await;
        assert_eq!(board.snapshot().await.unwrap().selection.selected, Some(sq("e2")));

        tap(&board, "e4").await;
        let matrix = board.board().await.unwrap();
        assert!(matrix.get(sq("e4")).is_some());
        assert_eq!(seen.lock().unwrap().as_slice(), ["e4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_pointer_is_ignored() {
        let (board, _) = exercise(true).await;
        let geometry = board.geometry();

        board.pointer(PointerEvent::down(1, geometry.centroid(sq("e2"))));
        board.settle().await.unwrap();
        board.pointer(PointerEvent::down(2, geometry.centroid(sq("d2"))));
        board.pointer(PointerEvent::moved(2, geometry.centroid(sq("d4"))));
        board.pointer(PointerEvent::up(2, geometry.centroid(sq("d4"))));
        board.settle().await.unwrap();

        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.sprite(sq("d2")).gesture, GestureState::Idle);
        assert_eq!(snapshot.sprite(sq("d2")).translation, geometry.to_translation(sq("d2")));
        assert_eq!(snapshot.sprite(sq("e2")).gesture, GestureState::Armed);
        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);

        // 第一个指针仍然持有手势
        board.pointer(PointerEvent::moved(1, geometry.centroid(sq("e4"))));
        board.pointer(PointerEvent::up(1, geometry.centroid(sq("e4"))));
        board.settle().await.unwrap();
        assert!(board.board().await.unwrap().get(sq("e4")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_rejection_rolls_back() {
        let (board, seen) = exercise(false).await;
        drag(&board, "e2", "e4").await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["e4"]);
        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        let snapshot = board.snapshot().await.unwrap();
        assert!(snapshot.highlights.is_empty());
        assert_eq!(snapshot.sprite(sq("e2")).piece, Some(Piece::new(PieceKind::Pawn, Color::White)));
        assert_eq!(snapshot.sprite(sq("e2")).translation, board.geometry().to_translation(sq("e2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_choice() {
        let (listener, seen) = recorder(true);
        let board = mounted(ModeConfig::exercise(Vec::new()), PROMOTION_FEN, Some(listener)).await;

        assert_eq!(board.move_piece(mv("e7e8")).await, None);
        board.settle().await.unwrap();
        assert!(board.get_state().await.unwrap().in_promotion);
        assert!(seen.lock().unwrap().is_empty());
        let snapshot = board.snapshot().await.unwrap();
        assert!(snapshot.promotion_pending);
        assert!(!snapshot.sprite(sq("e7")).enabled);

        let outcome = board.choose_promotion(PieceKind::Queen).await.unwrap();
        let ProposeOutcome::Committed(record) = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        assert_eq!(record.as_move().to_uci(), "e7e8q");
        board.settle().await.unwrap();

        let matrix = board.board().await.unwrap();
        assert_eq!(matrix.get(sq("e8")), Some(Piece::new(PieceKind::Queen, Color::White)));
        assert!(!board.snapshot().await.unwrap().promotion_pending);
        assert_eq!(seen.lock().unwrap().as_slice(), ["e8=Q"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_cancel() {
        let (listener, _) = recorder(true);
        let board = mounted(ModeConfig::exercise(Vec::new()), PROMOTION_FEN, Some(listener)).await;

        board.move_piece(mv("e7e8")).await;
        board.cancel_promotion().await.unwrap();
        board.settle().await.unwrap();

        assert_eq!(board.fen().await.unwrap(), PROMOTION_FEN);
        let snapshot = board.snapshot().await.unwrap();
        let pawn = snapshot.sprite(sq("e7"));
        assert!(pawn.enabled);
        assert_eq!(pawn.translation, board.geometry().to_translation(sq("e7")));
        assert!(!snapshot.promotion_pending);
        assert!(!board.get_state().await.unwrap().in_promotion);
        assert!(matches!(
            board.cancel_promotion().await,
            Err(EngineError::NoPendingPromotion)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkmate_highlight() {
        let (board, _) = exercise(true).await;
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            assert!(board.move_piece(mv(uci)).await.is_some(), "{} should commit", uci);
        }
        board.settle().await.unwrap();

        let state = board.get_state().await.unwrap();
        assert!(state.in_checkmate && state.game_over);
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.highlights[&sq("e1")], Palette::classic().checkmate_highlight);
        assert_eq!(snapshot.highlighted_squares(), vec![sq("e1"), sq("h4"), sq("d8")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_all_highlights_idempotent() {
        let (board, _) = exercise(true).await;
        board.highlight(sq("e4"), None);
        board.highlight(sq("d5"), Some(Palette::classic().custom_highlight));
        board.settle().await.unwrap();
        assert_eq!(board.snapshot().await.unwrap().highlights.len(), 2);

        board.reset_all_highlights();
        board.settle().await.unwrap();
        let once = board.snapshot().await.unwrap().highlights;
        board.reset_all_highlights();
        board.settle().await.unwrap();
        let twice = board.snapshot().await.unwrap().highlights;
        assert!(once.is_empty());
        assert_eq!(once, twice);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_highlights() {
        let (listener, _) = recorder(true);
        let board = mounted(ModeConfig::exercise(vec![sq("d4"), sq("e5")]), INITIAL_FEN, Some(listener)).await;
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.highlighted_squares(), vec![sq("d4"), sq("e5")]);

        board.set_highlight_squares(vec![sq("a1")]);
        board.settle().await.unwrap();
        assert_eq!(board.snapshot().await.unwrap().highlighted_squares(), vec![sq("a1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_board_invalid_fen() {
        let (board, _) = exercise(true).await;
        board.move_piece(mv("e2e4")).await;
        let fen = board.fen().await.unwrap();

        assert!(matches!(
            board.reset_board(Some("8/8/8 w")).await,
            Err(EngineError::Chess(ChessError::InvalidFen { .. }))
        ));
        assert_eq!(board.fen().await.unwrap(), fen);

        board.reset_board(None).await.unwrap();
        board.settle().await.unwrap();
        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        assert!(board.snapshot().await.unwrap().highlights.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_disabled_in_exercise() {
        let (board, _) = exercise(true).await;
        let request = NavigationRequest::new(history(&["e2e4"]), 0, 1);
        assert!(matches!(
            board.navigate_to_position(request),
            Err(EngineError::NavigationDisabled)
        ));
        assert!(board.navigation_status().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_visualization_ignores_gestures() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        drag(&board, "e2", "e4").await;

        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        let snapshot = board.snapshot().await.unwrap();
        assert!(!snapshot.gestures_enabled);
        assert_eq!(snapshot.sprite(sq("e2")).gesture, GestureState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_mode_rejection_rolls_back() {
        let (listener, seen) = recorder(false);
        let board = mounted(ModeConfig::game(), INITIAL_FEN, Some(listener)).await;

        assert_eq!(board.move_piece(mv("e2e4")).await, None);
        board.settle().await.unwrap();
        drag(&board, "d2", "d4").await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["e4", "d4"]);
        assert_eq!(board.fen().await.unwrap(), INITIAL_FEN);
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.sprite(sq("e2")).translation, board.geometry().to_translation(sq("e2")));
        assert_eq!(snapshot.sprite(sq("d2")).translation, board.geometry().to_translation(sq("d2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_mode_accepts_move() {
        let (listener, seen) = recorder(true);
        let board = mounted(ModeConfig::game(), INITIAL_FEN, Some(listener)).await;
        drag(&board, "e2", "e4").await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["e4"]);
        assert!(board.board().await.unwrap().get(sq("e4")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_replay_in_order() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&["e2e4", "e7e5", "g1f3"]);
        let mut events = board.subscribe();

        navigate(&board, &history, 0, 3).await;

        assert_eq!(
            started_moves(&mut events),
            vec![(sq("e2"), sq("e4")), (sq("e7"), sq("e5")), (sq("g1"), sq("f3"))]
        );
        assert_eq!(board.fen().await.unwrap(), history.fen_at(3).unwrap());
        assert_eq!(board.navigation_status().unwrap().displayed, Some(3));
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.highlighted_squares(), vec![sq("g1"), sq("f3")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backward_jump_loads_directly() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&TEN_MOVES);
        navigate(&board, &history, 0, 5).await;
        assert_eq!(board.fen().await.unwrap(), history.fen_at(5).unwrap());

        let mut events = board.subscribe();
        navigate(&board, &history, 5, 2).await;

        assert!(started_moves(&mut events).is_empty());
        assert_eq!(board.fen().await.unwrap(), history.fen_at(2).unwrap());
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.highlighted_squares(), vec![sq("e5"), sq("e7")]);
        assert!(snapshot.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_castling_replay() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&TEN_MOVES);
        navigate(&board, &history, 0, 10).await;

        assert_eq!(board.fen().await.unwrap(), history.fen_at(10).unwrap());
        let matrix = board.board().await.unwrap();
        assert_eq!(matrix.get(sq("g1")), Some(Piece::new(PieceKind::King, Color::White)));
        assert_eq!(matrix.get(sq("f1")), Some(Piece::new(PieceKind::Rook, Color::White)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_round_trip() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&TEN_MOVES);
        navigate(&board, &history, 0, 2).await;
        let matrix = board.board().await.unwrap();
        let highlights = board.snapshot().await.unwrap().highlights;

        navigate(&board, &history, 2, 6).await;
        assert_ne!(board.board().await.unwrap(), matrix);
        navigate(&board, &history, 6, 2).await;

        assert_eq!(board.board().await.unwrap(), matrix);
        assert_eq!(board.snapshot().await.unwrap().highlights, highlights);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_ply_is_noop() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&["e2e4", "e7e5"]);
        navigate(&board, &history, 0, 2).await;

        let mut events = board.subscribe();
        navigate(&board, &history, 2, 2).await;
        let mut mounted = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RenderEvent::Mounted { .. } | RenderEvent::MoveStarted { .. }) {
                mounted += 1;
            }
        }
        assert_eq!(mounted, 0);
        assert_eq!(board.fen().await.unwrap(), history.fen_at(2).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_request_supersedes() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&TEN_MOVES);
        let mut events = board.subscribe();

        board
            .navigate_to_position(NavigationRequest::new(history.clone(), 0, 8))
            .unwrap();
        time::sleep(Duration::from_millis(150)).await;
        board
            .navigate_to_position(NavigationRequest::new(history.clone(), 0, 1))
            .unwrap();
        board.settle().await.unwrap();

        assert!(started_moves(&mut events).len() < 8);
        assert_eq!(board.fen().await.unwrap(), history.fen_at(1).unwrap());
        assert_eq!(board.navigation_status().unwrap().displayed, Some(1));
        assert_eq!(
            board.snapshot().await.unwrap().highlighted_squares(),
            vec![sq("e2"), sq("e4")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_request_supersedes_forward_replay() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&TEN_MOVES);
        let mut events = board.subscribe();

        board
            .navigate_to_position(NavigationRequest::new(history.clone(), 0, 8))
            .unwrap();
        time::sleep(Duration::from_millis(200)).await;
        let mut started = started_moves(&mut events);
        assert!(!started.is_empty() && started.len() < 8, "{:?}", started);

        board
            .navigate_to_position(NavigationRequest::new(history.clone(), 0, 9))
            .unwrap();
        board.settle().await.unwrap();
        started.extend(started_moves(&mut events));

        // 接着已显示的半回合继续，不重复也不乱序
        let expected: Vec<(Square, Square)> = history.moves()[..9]
            .iter()
            .map(|record| (record.from, record.to))
            .collect();
        assert_eq!(started, expected);
        assert_eq!(board.fen().await.unwrap(), history.fen_at(9).unwrap());
        assert_eq!(board.navigation_status().unwrap().displayed, Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_failure_loads_target() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let valid = history(&["e2e4", "e7e5", "g1f3"]);

        // 第 2 步换成轮不到走的白兵
        let mut moves = valid.moves().to_vec();
        moves[1].from = sq("e4");
        moves[1].to = sq("e5");
        let fens = (0..=3).map(|ply| valid.fen_at(ply).unwrap().to_string()).collect();
        let broken = Arc::new(MoveHistory::new(moves, fens).unwrap());

        let mut events = board.subscribe();
        navigate(&board, &broken, 0, 3).await;

        let started = started_moves(&mut events);
        assert_eq!(started.first(), Some(&(sq("e2"), sq("e4"))));
        assert!(!started.contains(&(sq("g1"), sq("f3"))));
        assert_eq!(board.fen().await.unwrap(), valid.fen_at(3).unwrap());
        assert_eq!(board.navigation_status().unwrap().displayed, Some(3));
        assert!(board.snapshot().await.unwrap().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_black_orientation_drag_reports_standard_squares() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let listener = FnListener(move |record: &MoveRecord, _: &ChessboardState| -> anyhow::Result<bool> {
            log.lock().unwrap().push(record.as_move().to_uci());
            Ok(true)
        });

        let mut config = BoardConfig::default();
        config.orientation = Orientation::Black;
        let board = Chessboard::mount(
            config,
            ModeConfig::exercise(Vec::new()),
            Box::new(StandardRules::new()),
            Some(Arc::new(listener)),
        );
        board.settle().await.unwrap();

        // 黑方视角下 e2 在棋盘上半部分
        let geometry = board.geometry();
        let white = BoardConfig::default().geometry();
        assert_ne!(geometry.centroid(sq("e2")), white.centroid(sq("e2")));
        assert_eq!(geometry.square_at(geometry.centroid(sq("e2"))), Some(sq("e2")));

        drag(&board, "e2", "e4").await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["e2e4"]);
        let matrix = board.board().await.unwrap();
        assert_eq!(matrix.get(sq("e4")), Some(Piece::new(PieceKind::Pawn, Color::White)));
        let snapshot = board.snapshot().await.unwrap();
        assert_eq!(snapshot.sprite(sq("e4")).translation, geometry.to_translation(sq("e4")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_loads_target_fen() {
        let board = mounted(ModeConfig::visualization(), INITIAL_FEN, None).await;
        let history = history(&["e2e4"]);
        let mut request = NavigationRequest::new(history, 0, 7);
        request.target_fen = PROMOTION_FEN.to_string();
        board.navigate_to_position(request).unwrap();
        board.settle().await.unwrap();

        assert_eq!(board.fen().await.unwrap(), PROMOTION_FEN);
        assert_eq!(board.navigation_status().unwrap().displayed, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_finished_event() {
        let (board, _) = exercise(true).await;
        let mut events = board.subscribe();
        board.move_piece(mv("g1f3")).await;

        let mut finished = None;
        while let Ok(event) = events.try_recv() {
            if let RenderEvent::MoveFinished { from, to, outcome } = event {
                finished = Some((from, to, outcome));
            }
        }
        assert_eq!(finished, Some((sq("g1"), sq("f3"), AnimationOutcome::Finished)));
    }

    #[tokio::test]
    async fn test_coordinate_labels_follow_config() {
        let mut config = BoardConfig::default();
        config.show_coordinates = false;
        let board = Chessboard::mount(config, ModeConfig::visualization(), Box::new(StandardRules::new()), None);
        assert!(board.coordinate_labels().is_empty());

        let board = Chessboard::mount(
            BoardConfig::default(),
            ModeConfig::visualization(),
            Box::new(StandardRules::new()),
            None,
        );
        assert_eq!(board.coordinate_labels().len(), 16);
    }
}
