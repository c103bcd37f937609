use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use board_core::{MoveHistory, StandardRules, INITIAL_FEN};
use board_engine::{visualization_board, BoardConfig, NavigationRequest, Orientation, RenderEvent};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 在演示棋盘上回放一段棋谱
#[derive(Parser, Debug)]
#[command(name = "board-replay", version, about)]
struct Args {
    /// UCI 走法，例如 e2e4 e7e5 g1f3
    moves: Vec<String>,

    /// 起始局面
    #[arg(long, default_value = INITIAL_FEN)]
    fen: String,

    /// 棋盘朝向 (white / black)
    #[arg(long)]
    orientation: Option<Orientation>,

    /// 回放到第几个半回合，默认最后一步
    #[arg(long)]
    target: Option<usize>,

    /// 棋盘配置文件，默认使用用户配置目录
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("board_engine=debug".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BoardConfig::load_from(path)
            .with_context(|| format!("无法读取棋盘配置 {:?}", path))?,
        None => BoardConfig::load(),
    };
    if let Some(orientation) = args.orientation {
        config.orientation = orientation;
    }

    let uci: Vec<&str> = args.moves.iter().map(String::as_str).collect();
    let mut rules = StandardRules::from_fen(&args.fen)?;
    let history = Arc::new(MoveHistory::from_uci(&mut rules, &args.fen, &uci)?);
    let target = args.target.unwrap_or(history.len()).min(history.len());
    info!("棋谱共 {} 步，回放到第 {} 步", history.len(), target);

    let board = visualization_board(config, Box::new(StandardRules::from_fen(&args.fen)?));
    board.settle().await?;

    let mut events = board.subscribe();
    board.navigate_to_position(NavigationRequest::new(history.clone(), 0, target))?;
    board.settle().await?;

    while let Ok(event) = events.try_recv() {
        if let RenderEvent::MoveStarted { from, to } = event {
            info!("动画 {} -> {}", from, to);
        }
    }

    let state = board.get_state().await?;
    let snapshot = board.snapshot().await?;
    println!("{}", board.board().await?);
    println!("FEN: {}", state.fen);
    if !history.is_empty() {
        println!("棋谱: {}", history.to_move_text());
    }
    let highlighted: Vec<String> = snapshot
        .highlighted_squares()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("高亮: {}", highlighted.join(" "));
    if state.game_over {
        println!("对局结束 (将杀: {}, 和棋: {})", state.in_checkmate, state.in_draw);
    }

    Ok(())
}
