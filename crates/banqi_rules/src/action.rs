//! First-class move types for banqi.
//!
//! A player's intent ([`ProposedMove`]) is validated into a [`ResolvedMove`],
//! which is what gets committed to the log as a numbered [`Move`].

use super::{Piece, Position};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use tracing::instrument;

/// Opaque authenticated player identifier.
pub type PlayerId = String;

/// Discriminant shared by proposed, resolved and committed moves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MoveKind {
    /// Reveal a face-down piece.
    Flip,
    /// Step a revealed piece onto an empty square.
    Move,
    /// Take an opposing revealed piece.
    Capture,
}

/// A move as submitted by a player, before the engine resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProposedMove {
    /// Flip the face-down piece at `position`.
    Flip {
        /// Square to reveal.
        position: Position,
    },
    /// Step from `from` to the empty square `to`.
    Move {
        /// Source square.
        from: Position,
        /// Destination square.
        to: Position,
    },
    /// Capture the piece at `to` with the piece at `from`.
    Capture {
        /// Attacker square.
        from: Position,
        /// Defender square.
        to: Position,
    },
}

impl ProposedMove {
    /// Returns the move kind.
    pub fn kind(&self) -> MoveKind {
        match self {
            ProposedMove::Flip { .. } => MoveKind::Flip,
            ProposedMove::Move { .. } => MoveKind::Move,
            ProposedMove::Capture { .. } => MoveKind::Capture,
        }
    }
}

/// A validated move with everything the log needs to replay it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolvedMove {
    /// A flip and the piece it revealed.
    Flip {
        /// Revealed square.
        position: Position,
        /// Piece drawn from the hidden pool.
        piece: Piece,
    },
    /// A non-capturing step.
    Move {
        /// Source square.
        from: Position,
        /// Destination square.
        to: Position,
    },
    /// A capture and the piece it removed.
    Capture {
        /// Attacker square.
        from: Position,
        /// Defender square.
        to: Position,
        /// The defender that was taken.
        #[serde(rename = "capturedPiece")]
        captured_piece: Piece,
    },
}

impl ResolvedMove {
    /// Returns the move kind.
    pub fn kind(&self) -> MoveKind {
        match self {
            ResolvedMove::Flip { .. } => MoveKind::Flip,
            ResolvedMove::Move { .. } => MoveKind::Move,
            ResolvedMove::Capture { .. } => MoveKind::Capture,
        }
    }
}

impl std::fmt::Display for ResolvedMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedMove::Flip { position, piece } => write!(f, "flip {position} -> {piece}"),
            ResolvedMove::Move { from, to } => write!(f, "move {from} -> {to}"),
            ResolvedMove::Capture {
                from,
                to,
                captured_piece,
            } => write!(f, "capture {from} x {to} ({captured_piece})"),
        }
    }
}

/// A committed entry of the move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// 1-based, gapless position in the log.
    move_number: u32,
    /// Who made the move.
    player_id: PlayerId,
    /// When the move was committed, if the store recorded it.
    created_at: Option<DateTime<Utc>>,
    /// The resolved payload.
    #[serde(flatten)]
    action: ResolvedMove,
}

impl Move {
    /// Creates a committed move.
    #[instrument(skip(player_id), fields(player_id = %player_id))]
    pub fn new(
        move_number: u32,
        player_id: PlayerId,
        created_at: Option<DateTime<Utc>>,
        action: ResolvedMove,
    ) -> Self {
        Self {
            move_number,
            player_id,
            created_at,
            action,
        }
    }

    /// Returns the move kind.
    pub fn kind(&self) -> MoveKind {
        self.action.kind()
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}: {}", self.move_number, self.player_id, self.action)
    }
}
