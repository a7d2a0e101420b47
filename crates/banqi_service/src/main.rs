//! Banqi - command-line front end for the game service.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use banqi_rules::{Move, ProposedMove, reconstruct};
use banqi_service::{
    GameService, GameView, ServiceConfig, SqliteStore, TokenAuthenticator,
};
use clap::Parser;
use cli::{Cli, Command};
use std::path::Path;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the player's token when `--token` is absent.
const TOKEN_ENV: &str = "BANQI_TOKEN";

type Service = GameService<SqliteStore, TokenAuthenticator>;

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Command::Replay { log } = &cli.command {
        let moves = replay(log)?;
        return print_replay(&moves, cli.json);
    }

    let config = ServiceConfig::load(&cli.config)?;
    let service = build_service(&config)?;
    let credential = cli
        .token
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .with_context(|| format!("No token given; pass --token or set {}", TOKEN_ENV))?;

    let view = run(&service, &credential, cli.command)?;
    print_view(&view, cli.json)
}

/// Opens the store and wires up the service.
#[instrument(skip(config), fields(db = %config.database_path()))]
fn build_service(config: &ServiceConfig) -> Result<Service> {
    let store = SqliteStore::open(config.database_path())?;
    let auth = TokenAuthenticator::new(config.tokens().clone());
    info!("Service ready");
    Ok(GameService::new(store, auth, *config.max_commit_attempts()))
}

/// Dispatches one game command.
#[instrument(skip(service, credential))]
fn run(service: &Service, credential: &str, command: Command) -> Result<GameView> {
    let view = match command {
        Command::Create => service.create_game(credential)?,
        Command::Join { game_id } => service.join_game(credential, &game_id)?,
        Command::Leave { game_id } => service.leave_game(credential, &game_id)?,
        Command::Ready { game_id, unset } => service.set_ready(credential, &game_id, !unset)?,
        Command::Show { game_id } => service.game_view(credential, &game_id)?,
        Command::Flip { game_id, position } => submit(
            service,
            credential,
            &game_id,
            ProposedMove::Flip { position },
        )?,
        Command::Move { game_id, from, to } => submit(
            service,
            credential,
            &game_id,
            ProposedMove::Move { from, to },
        )?,
        Command::Capture { game_id, from, to } => submit(
            service,
            credential,
            &game_id,
            ProposedMove::Capture { from, to },
        )?,
        Command::Replay { .. } => anyhow::bail!("replay does not use the game store"),
    };
    Ok(view)
}

fn submit(
    service: &Service,
    credential: &str,
    game_id: &str,
    proposed: ProposedMove,
) -> Result<GameView> {
    let mut rng = rand::rng();
    Ok(service.submit_move(credential, game_id, &proposed, &mut rng)?)
}

/// Reads a JSON move log from disk.
#[instrument(skip(path), fields(path = %path.display()))]
fn replay(path: &Path) -> Result<Vec<Move>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read move log {}", path.display()))?;
    let moves: Vec<Move> = serde_json::from_str(&content)
        .with_context(|| format!("Move log {} is not valid JSON", path.display()))?;
    debug!(count = moves.len(), "Move log parsed");
    Ok(moves)
}

fn print_replay(moves: &[Move], json: bool) -> Result<()> {
    let state = reconstruct(moves)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }
    println!("{}", state.board().display());
    println!();
    println!("Moves replayed: {}", state.last_move_number());
    println!(
        "Captured by red: {}  by black: {}  face down: {}",
        state.captures().red.len(),
        state.captures().black.len(),
        state.face_down_pieces().len()
    );
    Ok(())
}

fn print_view(view: &GameView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    let game = view.game();
    println!("Game {} ({})", view.game_id(), game.status());
    for player in game.players() {
        let color = game
            .color_of(player.id())
            .map_or_else(|| "unassigned".to_string(), |c| c.to_string());
        let ready = if *player.ready() { "ready" } else { "not ready" };
        println!("  {} - {}, {}", player.id(), color, ready);
    }
    if let Some(turn) = game.current_turn() {
        println!("To move: {}", turn);
    }
    println!();
    println!("{}", view.state().board().display());
    println!();
    if let Some(last) = view.moves().last() {
        println!("Last move #{}: {} by {}", last.move_number(), last, last.player_id());
    }
    println!(
        "Captured by red: {}  by black: {}  face down: {}",
        view.state().captures().red.len(),
        view.state().captures().black.len(),
        view.state().face_down_pieces().len()
    );
    Ok(())
}
