//! 棋盘操作协调器
//!
//! 应用域中唯一持有规则引擎和棋盘矩阵的对象。负责：
//! - 校验走法、识别升变
//! - 提交走法后重算矩阵并发布到渲染域
//! - 维护最后一步与将杀高亮
//! - 调用宿主回调，被拒绝时回滚

use std::sync::Arc;

use board_core::{
    BoardMatrix, ChessboardState, Color, Move, MoveRecord, PieceKind, RulesEngine, Square,
};

use crate::error::{EngineError, Result};
use crate::highlight::{HighlightInputs, SharedHighlight};
use crate::interaction::Interaction;
use crate::registry::SquareRegistry;
use crate::render::{RenderHandle, SelectionMirror};

/// 走法来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSource {
    /// 用户手势或宿主调用
    User,
    /// 导航回放，不回调宿主，不逐步高亮
    Replay,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    Committed(MoveRecord),
    /// 不合法或当前不接受走子
    Rejected,
    /// 宿主拒绝，已回滚
    RolledBack,
    /// 等待选择升变棋子
    PromotionPending,
}

/// 选择棋子的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected { square: Square, targets: Vec<Square> },
    /// 点击了已选棋子的合法目标，需要走子
    AutoMove { from: Square, to: Square },
    Cleared,
    Ignored,
}

/// 等待中的升变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPromotion {
    pub from: Square,
    pub to: Square,
    pub color: Color,
}

pub struct BoardCoordinator {
    rules: Box<dyn RulesEngine>,
    board: BoardMatrix,
    registry: Arc<SquareRegistry>,
    render: RenderHandle,
    highlight: SharedHighlight,
    interaction: Interaction,
    selection: Option<Square>,
    pending_promotion: Option<PendingPromotion>,
}

impl BoardCoordinator {
    pub fn new(
        rules: Box<dyn RulesEngine>,
        registry: Arc<SquareRegistry>,
        render: RenderHandle,
        highlight: SharedHighlight,
        interaction: Interaction,
    ) -> Self {
        let board = rules.board();
        Self {
            rules,
            board,
            registry,
            render,
            highlight,
            interaction,
            selection: None,
            pending_promotion: None,
        }
    }

    pub fn registry(&self) -> &Arc<SquareRegistry> {
        &self.registry
    }

    pub fn board(&self) -> &BoardMatrix {
        &self.board
    }

    pub fn fen(&self) -> String {
        self.rules.fen()
    }

    pub fn selection(&self) -> Option<Square> {
        self.selection
    }

    pub fn pending_promotion(&self) -> Option<PendingPromotion> {
        self.pending_promotion
    }

    /// 宿主回调与 `get_state` 使用的局面状态
    pub fn state(&self) -> ChessboardState {
        ChessboardState::capture(self.rules.as_ref(), self.pending_promotion.is_some())
    }

    /// 把矩阵和选择状态发布到渲染域
    pub fn publish(&self) {
        self.render.mount(self.board.clone());
        self.sync_selection();
    }

    fn sync_selection(&self) {
        let targets = self
            .selection
            .map(|square| self.rules.legal_moves(square))
            .unwrap_or_default();
        self.render.sync_selection(SelectionMirror {
            turn: self.rules.turn(),
            selected: self.selection,
            targets,
        });
    }

    fn set_selection(&mut self, selection: Option<Square>) {
        self.selection = selection;
        self.sync_selection();
        self.highlight.update(|inputs| inputs.selected = selection);
    }

    /// 按下棋子：选中己方棋子，或完成已选棋子的点击走子
    pub fn select_piece(&mut self, square: Square, previous: Option<Square>) -> SelectOutcome {
        if self.pending_promotion.is_some() {
            return SelectOutcome::Ignored;
        }

        if let Some(from) = previous.or(self.selection) {
            if from != square && self.rules.is_legal(from, square) {
                self.set_selection(None);
                return SelectOutcome::AutoMove { from, to: square };
            }
        }

        match self.board.get(square) {
            Some(piece) if piece.color == self.rules.turn() => {
                let targets = self.rules.legal_moves(square);
                tracing::debug!("选中 {}，可走 {} 格", square, targets.len());
                self.set_selection(Some(square));
                SelectOutcome::Selected { square, targets }
            }
            _ => {
                self.set_selection(None);
                SelectOutcome::Cleared
            }
        }
    }

    /// 点击空格
    pub fn tap(&mut self, square: Square) -> SelectOutcome {
        if self.pending_promotion.is_some() {
            return SelectOutcome::Ignored;
        }
        match self.selection {
            Some(from) if self.rules.is_legal(from, square) => {
                self.set_selection(None);
                SelectOutcome::AutoMove { from, to: square }
            }
            Some(_) => {
                self.set_selection(None);
                SelectOutcome::Cleared
            }
            None => SelectOutcome::Ignored,
        }
    }

    /// 校验 from → to 是否在合法目标中
    pub fn validate(&self, from: Square, to: Square) -> bool {
        self.pending_promotion.is_none() && self.rules.is_legal(from, to)
    }

    /// 兵走到底线且未指定升变棋子
    pub fn needs_promotion(&self, mv: &Move) -> bool {
        if mv.promotion.is_some() {
            return false;
        }
        match self.board.get(mv.from) {
            Some(piece) => piece.kind == PieceKind::Pawn && mv.to.rank() == piece.color.promotion_rank(),
            None => false,
        }
    }

    /// 处理走法提议
    pub async fn propose(&mut self, mv: Move, source: MoveSource) -> ProposeOutcome {
        if self.pending_promotion.is_some() {
            tracing::debug!("升变未决，忽略走法 {}", mv);
            return ProposeOutcome::Rejected;
        }

        if !self.rules.is_legal(mv.from, mv.to) {
            tracing::debug!("非法走法 {}", mv);
            self.publish();
            return ProposeOutcome::Rejected;
        }

        if self.needs_promotion(&mv) {
            let color = self.rules.turn();
            tracing::info!("{} 等待选择升变棋子", mv);
            self.pending_promotion = Some(PendingPromotion {
                from: mv.from,
                to: mv.to,
                color,
            });
            self.registry.piece(mv.from).enable(false);
            self.render.set_promotion_pending(true);
            self.set_selection(None);
            return ProposeOutcome::PromotionPending;
        }

        self.commit(mv, source).await
    }

    async fn commit(&mut self, mv: Move, source: MoveSource) -> ProposeOutcome {
        let previous_inputs = self.highlight.inputs();

        let Some(record) = self.rules.make_move(mv) else {
            tracing::warn!("规则引擎拒绝走法 {}", mv);
            self.publish();
            return ProposeOutcome::Rejected;
        };

        self.board = self.rules.board();
        self.selection = None;

        if source == MoveSource::User {
            let checkmate = if self.rules.is_checkmate() {
                self.board.find_king(self.rules.turn())
            } else {
                None
            };
            self.highlight.update(|inputs| {
                inputs.selected = None;
                inputs.last_move = Some((record.from, record.to));
                inputs.checkmate = checkmate;
            });
        }
        self.publish();
        tracing::info!("提交走法 {} ({})", record.san, mv);

        if source == MoveSource::User {
            let state = ChessboardState::capture(self.rules.as_ref(), record.promotion.is_some());
            if !self.interaction.dispatch(&record, &state).await {
                self.rules.undo();
                self.board = self.rules.board();
                self.highlight.reconcile(HighlightInputs {
                    selected: None,
                    ..previous_inputs
                });
                self.publish();
                return ProposeOutcome::RolledBack;
            }
        }

        ProposeOutcome::Committed(record)
    }

    /// 选择升变棋子并提交
    pub async fn choose_promotion(&mut self, kind: PieceKind) -> Result<ProposeOutcome> {
        let pending = self.pending_promotion.ok_or(EngineError::NoPendingPromotion)?;
        if !kind.is_promotion_target() {
            return Err(board_core::ChessError::InvalidPromotion {
                symbol: kind.symbol(),
            }
            .into());
        }

        self.pending_promotion = None;
        self.registry.piece(pending.from).enable(true);
        self.render.set_promotion_pending(false);
        Ok(self
            .commit(Move::with_promotion(pending.from, pending.to, kind), MoveSource::User)
            .await)
    }

    /// 取消升变：棋子回到原格，局面不变
    pub fn cancel_promotion(&mut self) -> Result<()> {
        let pending = self.pending_promotion.take().ok_or(EngineError::NoPendingPromotion)?;
        tracing::info!("取消升变 {}{}", pending.from, pending.to);
        self.registry.piece(pending.from).enable(true);
        self.render.set_promotion_pending(false);
        self.publish();
        Ok(())
    }

    /// 重置局面，FEN 无效时保持原状
    pub fn reset_board(&mut self, fen: Option<&str>) -> Result<()> {
        match fen {
            Some(fen) => self.rules.load_fen(fen)?,
            None => self.rules.reset(),
        }

        if self.pending_promotion.take().is_some() {
            self.render.set_promotion_pending(false);
        }
        self.board = self.rules.board();
        self.selection = None;
        self.highlight.update(|inputs| {
            inputs.selected = None;
            inputs.last_move = None;
            inputs.checkmate = None;
        });
        self.publish();
        tracing::info!("局面已重置: {}", self.rules.fen());
        Ok(())
    }
}
