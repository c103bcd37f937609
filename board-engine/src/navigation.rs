//! 导航控制
//!
//! 在棋谱的两个半回合之间切换局面：
//! - 向前：逐步动画回放，每步之间停顿
//! - 向后或跳转：直接加载目标 FEN
//!
//! 请求经过一帧防抖，新请求在下一步边界处取代旧请求。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use board_core::{MoveHistory, NAVIGATION_DEBOUNCE, REPLAY_STEP_DELAY, RESET_SETTLE_DELAY};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::app::AppHandle;
use crate::coordinator::MoveSource;
use crate::error::{EngineError, Result};
use crate::highlight::SharedHighlight;
use crate::registry::SquareRegistry;

/// 导航请求
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    /// 目标局面，越界或棋谱为空时直接加载
    pub target_fen: String,
    pub history: Arc<MoveHistory>,
    /// 调用方认为当前所在的半回合
    pub current: usize,
    pub target: usize,
}

impl NavigationRequest {
    pub fn new(history: Arc<MoveHistory>, current: usize, target: usize) -> Self {
        let target_fen = history
            .fen_at(target.min(history.len()))
            .unwrap_or_else(|| history.initial_fen())
            .to_string();
        Self {
            target_fen,
            history,
            current,
            target,
        }
    }
}

/// 导航进度
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationStatus {
    /// 当前显示的半回合，直接加载 FEN 后未知
    pub displayed: Option<usize>,
    /// 最近处理完的请求编号
    pub completed: u64,
}

type Latest = Option<(u64, NavigationRequest)>;

/// 导航控制器
#[derive(Debug)]
pub struct NavigationController {
    requests: watch::Sender<Latest>,
    status: watch::Receiver<NavigationStatus>,
    next_id: AtomicU64,
    task: JoinHandle<()>,
}

impl NavigationController {
    pub fn spawn(
        app: AppHandle,
        registry: Arc<SquareRegistry>,
        highlight: SharedHighlight,
        auto_last_move: bool,
    ) -> Self {
        let (requests, requests_rx) = watch::channel(None);
        let (status_tx, status) = watch::channel(NavigationStatus::default());
        let worker = NavigationWorker {
            app,
            registry,
            highlight,
            auto_last_move,
            requests: requests_rx,
            status: status_tx,
            displayed: None,
        };
        let task = tokio::spawn(worker.run());

        Self {
            requests,
            status,
            next_id: AtomicU64::new(0),
            task,
        }
    }

    /// 提交请求，返回请求编号
    pub fn navigate(&self, request: NavigationRequest) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            "导航请求 #{}: {} -> {} / {}",
            id,
            request.current,
            request.target,
            request.history.len()
        );
        self.requests.send_replace(Some((id, request)));
        id
    }

    pub fn status(&self) -> NavigationStatus {
        self.status.borrow().clone()
    }

    /// 等待最新请求处理完毕
    pub async fn wait_settled(&self) -> Result<()> {
        let latest = self.next_id.load(Ordering::SeqCst);
        let mut status = self.status.clone();
        status
            .wait_for(|s| s.completed >= latest)
            .await
            .map_err(|_| EngineError::DomainClosed { domain: "navigation" })?;
        Ok(())
    }
}

impl Drop for NavigationController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Done,
    Superseded,
}

struct NavigationWorker {
    app: AppHandle,
    registry: Arc<SquareRegistry>,
    highlight: SharedHighlight,
    auto_last_move: bool,
    requests: watch::Receiver<Latest>,
    status: watch::Sender<NavigationStatus>,
    /// 实际显示的棋谱与半回合
    displayed: Option<(Arc<MoveHistory>, usize)>,
}

impl NavigationWorker {
    async fn run(mut self) {
        while self.requests.changed().await.is_ok() {
            time::sleep(NAVIGATION_DEBOUNCE).await;
            let latest = (*self.requests.borrow_and_update()).clone();
            let Some((id, request)) = latest else {
                continue;
            };

            if self.navigate(&request).await == Step::Superseded {
                tracing::debug!("导航请求 #{} 被新请求取代", id);
                continue;
            }

            let displayed = self.displayed.as_ref().map(|(_, ply)| *ply);
            self.status.send_modify(|status| {
                status.displayed = displayed;
                status.completed = id;
            });
        }
    }

    fn superseded(&self) -> bool {
        self.requests.has_changed().unwrap_or(true)
    }

    async fn navigate(&mut self, request: &NavigationRequest) -> Step {
        let history = &request.history;
        let target = request.target;
        let current = match &self.displayed {
            Some((shown, ply)) if Arc::ptr_eq(shown, history) => *ply,
            _ => request.current,
        };

        if history.is_empty() || target > history.len() || current > history.len() {
            self.load(&request.target_fen).await;
            self.displayed = None;
            self.finish(None).await;
            return Step::Done;
        }

        if target > current {
            if self.forward(history, current, target, &request.target_fen).await == Step::Superseded {
                return Step::Superseded;
            }
        } else if target < current {
            self.load(self.target_fen(history, target, &request.target_fen)).await;
            self.displayed = Some((history.clone(), target));
        } else {
            self.displayed = Some((history.clone(), target));
        }

        self.finish(history.last_move_at(target)).await;
        Step::Done
    }

    async fn forward(
        &mut self,
        history: &Arc<MoveHistory>,
        current: usize,
        target: usize,
        fallback: &str,
    ) -> Step {
        self.highlight.invalidate();
        self.highlight.update(|inputs| {
            inputs.selected = None;
            inputs.last_move = None;
            inputs.checkmate = None;
        });

        if let Some(start) = history.fen_at(current) {
            let synced = matches!(self.app.fen().await, Ok(fen) if fen == start);
            if !synced {
                tracing::debug!("引擎局面与第 {} 步不一致，重新同步", current);
                self.load(start).await;
                time::sleep(RESET_SETTLE_DELAY).await;
            }
        }

        for ply in current + 1..=target {
            if self.superseded() {
                return Step::Superseded;
            }
            let Some(record) = history.move_to_ply(ply) else {
                break;
            };

            let piece = self.registry.piece(record.from);
            let replayed = piece
                .move_to_with(record.to, record.promotion, MoveSource::Replay)
                .await;
            if replayed.is_none() {
                tracing::warn!("回放第 {} 步 {} 失败，直接跳到第 {} 步", ply, record.san, target);
                self.load(self.target_fen(history, target, fallback)).await;
                break;
            }
            self.displayed = Some((history.clone(), ply));

            if ply < target {
                time::sleep(REPLAY_STEP_DELAY).await;
            }
        }

        self.displayed = Some((history.clone(), target));
        Step::Done
    }

    /// 缓存缺失时退回请求携带的目标局面
    fn target_fen<'a>(&self, history: &'a MoveHistory, target: usize, fallback: &'a str) -> &'a str {
        history.fen_at(target).unwrap_or_else(|| {
            tracing::warn!("棋谱缺少第 {} 步的局面，使用请求中的 FEN", target);
            fallback
        })
    }

    async fn load(&self, fen: &str) {
        if let Err(e) = self.app.reset_board(Some(fen.to_string())).await {
            tracing::warn!("导航加载局面失败: {}", e);
        }
    }

    /// 应用目标局面的最后一步高亮并等待生效
    async fn finish(&self, last_move: Option<(board_core::Square, board_core::Square)>) {
        let last_move = last_move.filter(|_| self.auto_last_move);
        let handle = self.highlight.update(|inputs| {
            inputs.selected = None;
            inputs.last_move = last_move;
            inputs.checkmate = None;
        });
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("高亮任务异常结束: {}", e);
            }
        }
    }
}
