//! Banqi rules engine - pure game logic for dark chess.
//!
//! Game state is never stored. It is rebuilt from the append-only move log on
//! every request and proposed moves are checked against that rebuilt state.
//!
//! # Architecture
//!
//! - **Board model**: positions, pieces, cells and the hidden-piece pool
//! - **Reconstruction**: [`reconstruct`] replays committed [`Move`]s into a [`BoardState`]
//! - **Validation**: [`validate`] turns a [`ProposedMove`] into a [`ResolvedMove`]
//! - **Seating**: [`GameDocument`] tracks seats, colors and turns
//!
//! # Example
//!
//! ```
//! use banqi_rules::{GameDocument, Position, ProposedMove, reconstruct, validate};
//!
//! let now = chrono::Utc::now();
//! let mut game = GameDocument::new(now);
//! game.add_player("alice", now).unwrap();
//! game.add_player("bob", now).unwrap();
//!
//! let state = reconstruct(&[]).unwrap();
//! let flip = ProposedMove::Flip { position: Position::new(0, 0).unwrap() };
//! game.authorize("alice", &flip, *state.last_move_number()).unwrap();
//! let resolved = validate(&flip, &state, &game, "alice", &mut rand::rng()).unwrap();
//! game.record_move("alice", &resolved, state.next_move_number(), now);
//! assert_eq!(game.current_turn().as_deref(), Some("bob"));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod contracts;
mod error;
mod game;
pub mod invariants;
mod rules;
mod state;
mod types;

pub use action::{Move, MoveKind, PlayerId, ProposedMove, ResolvedMove};
pub use contracts::{
    CapturePath, DestinationIsEmpty, OrthogonalStep, PlayerHasColor, RankAllows,
    SourceIsOwnPiece, TargetIsFaceDown, TargetIsOpponent, validate,
};
pub use error::{ReconstructionError, StatusClass, ValidationError};
pub use game::{
    ColorAssignment, GameDocument, GameStatus, JoinOutcome, MAX_PLAYERS, PartialGameDocument,
    PartialPlayer, SeatedPlayer,
};
pub use rules::{can_capture, is_orthogonally_adjacent, is_same_line, pieces_between};
pub use state::{BoardState, Captures, reconstruct};
pub use types::{
    Board, COLUMNS, Cell, Color, Piece, PieceKind, PiecePool, Position, PositionOutOfBounds,
    ROWS, TOTAL_PIECES,
};
