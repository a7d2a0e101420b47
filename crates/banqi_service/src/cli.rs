//! Command-line interface for the banqi service.

use banqi_rules::Position;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Banqi - play dark chess against a local game store
#[derive(Parser, Debug)]
#[command(name = "banqi")]
#[command(about = "Banqi game service over a local SQLite store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file (defaults apply if it does not exist)
    #[arg(short, long, default_value = "banqi.toml", global = true)]
    pub config: PathBuf,

    /// Bearer token identifying the player (falls back to BANQI_TOKEN)
    #[arg(short, long, global = true)]
    pub token: Option<String>,

    /// Print results as JSON instead of a board diagram
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a game and take the first seat
    Create,

    /// Take a seat in a game
    Join {
        /// Game id
        game_id: String,
    },

    /// Give up your seat before the first flip
    Leave {
        /// Game id
        game_id: String,
    },

    /// Mark yourself ready (or not ready with --unset)
    Ready {
        /// Game id
        game_id: String,

        /// Clear the ready flag instead of setting it
        #[arg(long)]
        unset: bool,
    },

    /// Flip a face-down piece
    Flip {
        /// Game id
        game_id: String,

        /// Square as ROW,COL
        #[arg(value_parser = parse_position)]
        position: Position,
    },

    /// Step a piece one square onto an empty square
    Move {
        /// Game id
        game_id: String,

        /// Source square as ROW,COL
        #[arg(value_parser = parse_position)]
        from: Position,

        /// Destination square as ROW,COL
        #[arg(value_parser = parse_position)]
        to: Position,
    },

    /// Capture an opposing piece
    Capture {
        /// Game id
        game_id: String,

        /// Attacker square as ROW,COL
        #[arg(value_parser = parse_position)]
        from: Position,

        /// Defender square as ROW,COL
        #[arg(value_parser = parse_position)]
        to: Position,
    },

    /// Show a game's board, seats and turn
    Show {
        /// Game id
        game_id: String,
    },

    /// Rebuild a board offline from a JSON move log
    Replay {
        /// File holding a JSON array of committed moves
        log: PathBuf,
    },
}

/// Parses `ROW,COL` into an on-board position.
pub fn parse_position(input: &str) -> Result<Position, String> {
    let (row, col) = input
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL, got '{}'", input))?;
    let row: i64 = row
        .trim()
        .parse()
        .map_err(|e| format!("bad row '{}': {}", row, e))?;
    let col: i64 = col
        .trim()
        .parse()
        .map_err(|e| format!("bad column '{}': {}", col, e))?;
    Position::new(row, col).ok_or_else(|| format!("({}, {}) is off the board", row, col))
}
