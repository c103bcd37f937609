//! 高亮控制
//!
//! 由输入（选中格、最后一步、将杀、自定义格）推导高亮集合。集合不变时什么都不做；
//! 变化时立即清空 64 个高亮层，等待两帧后再应用新集合，期间若有更新的调和则放弃。
//! 每轮调和带批次号，渲染域只接受最新批次。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use board_core::Square;
use tokio::task::JoinHandle;

use crate::registry::SquareRegistry;
use crate::render::RenderHandle;
use crate::theme::{Palette, Rgba};

/// 高亮输入
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightInputs {
    pub selected: Option<Square>,
    /// 最后一步的起止格
    pub last_move: Option<(Square, Square)>,
    /// 被将杀一方的王
    pub checkmate: Option<Square>,
    pub custom: Vec<Square>,
}

impl HighlightInputs {
    /// 解析为格子到颜色的映射，后写入的覆盖先写入的
    pub fn resolve(&self, palette: &Palette) -> BTreeMap<Square, Rgba> {
        let mut set = BTreeMap::new();
        for square in &self.custom {
            set.insert(*square, palette.custom_highlight);
        }
        if let Some((from, to)) = self.last_move {
            set.insert(from, palette.last_move_highlight);
            set.insert(to, palette.last_move_highlight);
        }
        if let Some(square) = self.selected {
            set.insert(square, palette.selection_highlight);
        }
        if let Some(square) = self.checkmate {
            set.insert(square, palette.checkmate_highlight);
        }
        set
    }
}

/// 高亮调和器
#[derive(Debug)]
pub struct HighlightController {
    registry: Arc<SquareRegistry>,
    render: RenderHandle,
    palette: Palette,
    inputs: HighlightInputs,
    /// 上一次调和得到的集合
    previous: Option<BTreeMap<Square, Rgba>>,
    generation: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
}

impl HighlightController {
    pub fn new(registry: Arc<SquareRegistry>, render: RenderHandle, palette: Palette) -> Self {
        Self {
            registry,
            render,
            palette,
            inputs: HighlightInputs::default(),
            previous: None,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inputs(&self) -> &HighlightInputs {
        &self.inputs
    }

    /// 下一次调和无论集合是否变化都重新应用
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    /// 是否有尚未应用的集合
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// 用新输入调和，集合未变时返回 None
    pub fn reconcile(&mut self, inputs: HighlightInputs) -> Option<JoinHandle<()>> {
        let resolved = inputs.resolve(&self.palette);
        self.inputs = inputs;
        if self.previous.as_ref() == Some(&resolved) {
            return None;
        }
        self.previous = Some(resolved.clone());

        self.registry.reset_all_highlights();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // 批次号与清空在同一把锁内按序送达渲染域
        self.render.begin_highlights(generation);
        let current = self.generation.clone();
        let pending = self.pending.clone();
        let render = self.render.clone();
        pending.fetch_add(1, Ordering::SeqCst);

        Some(tokio::spawn(async move {
            let waited = async {
                render.next_frame().await?;
                render.next_frame().await
            }
            .await;

            if waited.is_ok() && current.load(Ordering::SeqCst) == generation {
                render.apply_highlights(generation, resolved);
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    /// 修改部分输入后调和
    pub fn update(&mut self, f: impl FnOnce(&mut HighlightInputs)) -> Option<JoinHandle<()>> {
        let mut inputs = self.inputs.clone();
        f(&mut inputs);
        self.reconcile(inputs)
    }
}

/// 跨域共享的高亮调和器，锁只在同步代码中短暂持有
#[derive(Debug, Clone)]
pub struct SharedHighlight {
    inner: Arc<Mutex<HighlightController>>,
}

impl SharedHighlight {
    pub fn new(controller: HighlightController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut HighlightController) -> R) -> Option<R> {
        if let Ok(mut controller) = self.inner.lock() {
            Some(f(&mut controller))
        } else {
            tracing::error!("高亮状态锁已损坏");
            None
        }
    }

    pub fn inputs(&self) -> HighlightInputs {
        self.with(|c| c.inputs().clone()).unwrap_or_default()
    }

    pub fn reconcile(&self, inputs: HighlightInputs) -> Option<JoinHandle<()>> {
        self.with(|c| c.reconcile(inputs)).flatten()
    }

    pub fn update(&self, f: impl FnOnce(&mut HighlightInputs)) -> Option<JoinHandle<()>> {
        self.with(|c| c.update(f)).flatten()
    }

    pub fn invalidate(&self) {
        self.with(|c| c.invalidate());
    }

    pub fn is_pending(&self) -> bool {
        self.with(|c| c.is_pending()).unwrap_or(false)
    }
}
