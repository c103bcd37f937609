//! 格子引用注册表
//!
//! 挂载时一次性建立 64 个槽位，每个格子对应一个棋子句柄和一个高亮层句柄。
//! 句柄只是发往两个域的消息入口，本身不持有状态，挂载后永不重建。

use board_core::{Move, MoveRecord, PieceKind, Square, SQUARE_COUNT};

use crate::animation::AnimationOutcome;
use crate::app::AppHandle;
use crate::coordinator::{MoveSource, ProposeOutcome};
use crate::render::RenderHandle;
use crate::theme::Rgba;

/// 棋子句柄
#[derive(Debug, Clone)]
pub struct PieceHandle {
    square: Square,
    render: RenderHandle,
    app: AppHandle,
}

impl PieceHandle {
    pub fn square(&self) -> Square {
        self.square
    }

    /// 用户走子：动画结束且提交（或被拒绝）后返回
    pub async fn move_to(&self, to: Square) -> Option<MoveRecord> {
        self.move_to_with(to, None, MoveSource::User).await
    }

    /// 先在应用域校验；合法则动画到目标格再提交，否则动画回原格
    pub async fn move_to_with(
        &self,
        to: Square,
        promotion: Option<PieceKind>,
        source: MoveSource,
    ) -> Option<MoveRecord> {
        let from = self.square;
        let legal = match self.app.validate(from, to).await {
            Ok(legal) => legal,
            Err(e) => {
                tracing::warn!("校验 {}{} 失败: {}", from, to, e);
                false
            }
        };

        if !legal {
            self.render.move_to(from, from).await;
            return None;
        }

        if self.render.move_to(from, to).await == AnimationOutcome::Interrupted {
            tracing::debug!("{}{} 的动画被打断", from, to);
        }

        let mv = Move { from, to, promotion };
        match self.app.propose(mv, source).await {
            Ok(ProposeOutcome::Committed(record)) => Some(record),
            Ok(outcome) => {
                tracing::debug!("走法 {} 未提交: {:?}", mv, outcome);
                None
            }
            Err(e) => {
                tracing::warn!("提交走法 {} 失败: {}", mv, e);
                None
            }
        }
    }

    pub fn enable(&self, enabled: bool) {
        self.render.set_enabled(self.square, enabled);
    }
}

/// 高亮层句柄
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    square: Square,
    render: RenderHandle,
}

impl OverlayHandle {
    /// 高亮，不指定颜色时使用最后一步的颜色
    pub fn highlight(&self, color: Option<Rgba>) {
        self.render.highlight(self.square, color);
    }

    pub fn reset(&self) {
        self.render.reset_highlight(self.square);
    }

    pub async fn is_highlighted(&self) -> bool {
        self.render.is_highlighted(self.square).await
    }
}

#[derive(Debug)]
struct SquareRefs {
    piece: PieceHandle,
    overlay: OverlayHandle,
}

/// 64 格注册表，按格子索引寻址
#[derive(Debug)]
pub struct SquareRegistry {
    slots: Vec<SquareRefs>,
}

impl SquareRegistry {
    pub fn new(render: RenderHandle, app: AppHandle) -> Self {
        let slots = Square::all()
            .map(|square| SquareRefs {
                piece: PieceHandle {
                    square,
                    render: render.clone(),
                    app: app.clone(),
                },
                overlay: OverlayHandle {
                    square,
                    render: render.clone(),
                },
            })
            .collect::<Vec<_>>();
        debug_assert_eq!(slots.len(), SQUARE_COUNT);
        Self { slots }
    }

    pub fn piece(&self, square: Square) -> &PieceHandle {
        &self.slots[square.index()].piece
    }

    pub fn overlay(&self, square: Square) -> &OverlayHandle {
        &self.slots[square.index()].overlay
    }

    /// 清空所有高亮层，可重复调用
    pub fn reset_all_highlights(&self) {
        for slot in &self.slots {
            slot.overlay.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
