//! 应用域
//!
//! 独立任务，按顺序处理发给协调器的命令。点击走子要走注册表的动画流程，
//! 而这条流程会回到本域做校验与提交，所以放到单独的任务里执行。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use board_core::{BoardMatrix, ChessboardState, Move, PieceKind, Square};
use tokio::sync::{mpsc, oneshot};

use crate::coordinator::{BoardCoordinator, MoveSource, ProposeOutcome, SelectOutcome};
use crate::error::{EngineError, Result};

/// 应用域命令
#[derive(Debug)]
pub enum AppCommand {
    SelectPiece { square: Square, previous: Option<Square> },
    Tap { square: Square },
    Validate { from: Square, to: Square, reply: oneshot::Sender<bool> },
    Propose {
        mv: Move,
        source: MoveSource,
        reply: Option<oneshot::Sender<ProposeOutcome>>,
    },
    ChoosePromotion {
        kind: PieceKind,
        reply: oneshot::Sender<Result<ProposeOutcome>>,
    },
    CancelPromotion { reply: oneshot::Sender<Result<()>> },
    ResetBoard {
        fen: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    State { reply: oneshot::Sender<ChessboardState> },
    Board { reply: oneshot::Sender<BoardMatrix> },
    Fen { reply: oneshot::Sender<String> },
    /// 回复此刻是否没有进行中的点击走子
    Barrier { reply: oneshot::Sender<bool> },
}

/// 应用域句柄
#[derive(Debug, Clone)]
pub struct AppHandle {
    tx: mpsc::UnboundedSender<AppCommand>,
}

impl AppHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: AppCommand) {
        if self.tx.send(command).is_err() {
            tracing::trace!("应用域已关闭，丢弃命令");
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> AppCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .map_err(|_| EngineError::DomainClosed { domain: "app" })?;
        rx.await.map_err(|_| EngineError::DomainClosed { domain: "app" })
    }

    pub fn select_piece(&self, square: Square, previous: Option<Square>) {
        self.send(AppCommand::SelectPiece { square, previous });
    }

    pub fn tap(&self, square: Square) {
        self.send(AppCommand::Tap { square });
    }

    pub async fn validate(&self, from: Square, to: Square) -> Result<bool> {
        self.request(|reply| AppCommand::Validate { from, to, reply }).await
    }

    pub async fn propose(&self, mv: Move, source: MoveSource) -> Result<ProposeOutcome> {
        self.request(|reply| AppCommand::Propose {
            mv,
            source,
            reply: Some(reply),
        })
        .await
    }

    /// 提交走法，不等待结果（拖拽松手后使用）
    pub fn propose_detached(&self, mv: Move, source: MoveSource) {
        self.send(AppCommand::Propose {
            mv,
            source,
            reply: None,
        });
    }

    pub async fn choose_promotion(&self, kind: PieceKind) -> Result<ProposeOutcome> {
        self.request(|reply| AppCommand::ChoosePromotion { kind, reply }).await?
    }

    pub async fn cancel_promotion(&self) -> Result<()> {
        self.request(|reply| AppCommand::CancelPromotion { reply }).await?
    }

    pub async fn reset_board(&self, fen: Option<String>) -> Result<()> {
        self.request(|reply| AppCommand::ResetBoard { fen, reply }).await?
    }

    pub async fn state(&self) -> Result<ChessboardState> {
        self.request(|reply| AppCommand::State { reply }).await
    }

    pub async fn board(&self) -> Result<BoardMatrix> {
        self.request(|reply| AppCommand::Board { reply }).await
    }

    pub async fn fen(&self) -> Result<String> {
        self.request(|reply| AppCommand::Fen { reply }).await
    }

    pub async fn barrier(&self) -> Result<bool> {
        self.request(|reply| AppCommand::Barrier { reply }).await
    }
}

/// 应用域任务
pub struct AppDomain {
    coordinator: BoardCoordinator,
    rx: mpsc::UnboundedReceiver<AppCommand>,
    /// 进行中的点击走子
    inflight: Arc<AtomicUsize>,
}

impl AppDomain {
    pub fn new(coordinator: BoardCoordinator, rx: mpsc::UnboundedReceiver<AppCommand>) -> Self {
        Self {
            coordinator,
            rx,
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn run(mut self) {
        tracing::debug!("应用域已启动");
        self.coordinator.publish();
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
        }
        tracing::debug!("应用域已停止");
    }

    async fn handle(&mut self, command: AppCommand) {
        match command {
            AppCommand::SelectPiece { square, previous } => {
                let outcome = self.coordinator.select_piece(square, previous);
                self.follow(outcome);
            }
            AppCommand::Tap { square } => {
                let outcome = self.coordinator.tap(square);
                self.follow(outcome);
            }
            AppCommand::Validate { from, to, reply } => {
                let _ = reply.send(self.coordinator.validate(from, to));
            }
            AppCommand::Propose { mv, source, reply } => {
                let outcome = self.coordinator.propose(mv, source).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            AppCommand::ChoosePromotion { kind, reply } => {
                let _ = reply.send(self.coordinator.choose_promotion(kind).await);
            }
            AppCommand::CancelPromotion { reply } => {
                let _ = reply.send(self.coordinator.cancel_promotion());
            }
            AppCommand::ResetBoard { fen, reply } => {
                let _ = reply.send(self.coordinator.reset_board(fen.as_deref()));
            }
            AppCommand::State { reply } => {
                let _ = reply.send(self.coordinator.state());
            }
            AppCommand::Board { reply } => {
                let _ = reply.send(self.coordinator.board().clone());
            }
            AppCommand::Fen { reply } => {
                let _ = reply.send(self.coordinator.fen());
            }
            AppCommand::Barrier { reply } => {
                let _ = reply.send(self.inflight.load(Ordering::SeqCst) == 0);
            }
        }
    }

    fn follow(&self, outcome: SelectOutcome) {
        let SelectOutcome::AutoMove { from, to } = outcome else {
            return;
        };
        let piece = self.coordinator.registry().piece(from).clone();
        let inflight = self.inflight.clone();
        inflight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            piece.move_to(to).await;
            inflight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}
