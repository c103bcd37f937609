//! 宿主走子回调

use std::sync::Arc;

use async_trait::async_trait;
use board_core::{ChessboardState, MoveRecord};

/// 宿主回调：返回 `Ok(true)` 接受走法，`Ok(false)` 或错误都会回滚
#[async_trait]
pub trait MoveListener: Send + Sync {
    async fn on_move(&self, record: &MoveRecord, state: &ChessboardState) -> anyhow::Result<bool>;
}

/// 把同步闭包适配为回调
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F> MoveListener for FnListener<F>
where
    F: Fn(&MoveRecord, &ChessboardState) -> anyhow::Result<bool> + Send + Sync,
{
    async fn on_move(&self, record: &MoveRecord, state: &ChessboardState) -> anyhow::Result<bool> {
        (self.0)(record, state)
    }
}

/// 交互控制
#[derive(Clone, Default)]
pub struct Interaction {
    listener: Option<Arc<dyn MoveListener>>,
    enabled: bool,
}

impl Interaction {
    pub fn new(listener: Option<Arc<dyn MoveListener>>, enabled: bool) -> Self {
        Self { listener, enabled }
    }

    /// 手势只在模式允许且宿主提供了回调时开启
    pub fn gestures_enabled(&self) -> bool {
        self.enabled && self.listener.is_some()
    }

    /// 通知宿主，返回是否接受
    pub async fn dispatch(&self, record: &MoveRecord, state: &ChessboardState) -> bool {
        let Some(listener) = &self.listener else {
            return true;
        };
        match listener.on_move(record, state).await {
            Ok(accepted) => {
                if !accepted {
                    tracing::warn!("宿主拒绝了走法 {}", record.san);
                }
                accepted
            }
            Err(e) => {
                tracing::error!("宿主回调出错，回滚走法 {}: {}", record.san, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("has_listener", &self.listener.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}
