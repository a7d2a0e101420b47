//! Error types for the rules engine.
//!
//! [`ValidationError`] is the expected, user-facing rejection of a proposed move.
//! [`ReconstructionError`] means the committed log could not have been produced
//! by accepted moves and is never shown to a player as a rule violation.

use super::{Piece, Position};
use serde::{Deserialize, Serialize};

/// Suggested response class for a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusClass {
    /// Malformed or illegal request (400).
    BadRequest,
    /// No valid credential (401).
    Unauthorized,
    /// Authenticated but not allowed (403).
    Forbidden,
    /// Game does not exist (404).
    NotFound,
    /// Request conflicts with current game state (409).
    Conflict,
    /// Server-side failure (500).
    Internal,
}

impl StatusClass {
    /// HTTP status code conventionally used for this class.
    pub fn http_code(self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::Unauthorized => 401,
            StatusClass::Forbidden => 403,
            StatusClass::NotFound => 404,
            StatusClass::Conflict => 409,
            StatusClass::Internal => 500,
        }
    }
}

/// A proposed move or seating request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ValidationError {
    /// The actor holds no seat (or no color yet) in this game.
    #[display("Player is not seated in this game")]
    NotSeated,

    /// Both seats are taken.
    #[display("Game already has two players")]
    GameFull,

    /// Colors are assigned; seats can no longer change.
    #[display("Seats are locked once colors are assigned")]
    SeatsLocked,

    /// A move needs both seats filled.
    #[display("Game needs two seated players before moves can be made")]
    WaitingForOpponent,

    /// The game already ended.
    #[display("Game is already finished")]
    GameFinished,

    /// The opening move was not a flip.
    #[display("The first move of the game must flip a piece")]
    FirstMoveMustFlip,

    /// The actor is not the player to move.
    #[display("It is not your turn")]
    NotYourTurn,

    /// Flip target is not face down.
    #[display("Only face-down pieces can be flipped")]
    NotFaceDown(Position),

    /// The hidden pool is empty.
    #[display("No remaining face-down pieces to reveal")]
    NoFaceDownPieces,

    /// Source square has no revealed piece.
    #[display("No revealed piece at the source square")]
    NoSourcePiece(Position),

    /// Source piece belongs to the opponent.
    #[display("Cannot move an opponent piece")]
    OpponentPiece(Position),

    /// Step destination holds a revealed piece.
    #[display("Destination square is occupied")]
    DestinationOccupied(Position),

    /// Step destination is still face down.
    #[display("Cannot move onto an unrevealed square")]
    DestinationUnrevealed(Position),

    /// Step is not exactly one orthogonal square.
    #[display("Pieces move one square orthogonally")]
    NotOrthogonalStep,

    /// Capture target has no revealed piece.
    #[display("No revealed opponent piece to capture")]
    NothingToCapture(Position),

    /// Capture target belongs to the attacker.
    #[display("Cannot capture your own piece")]
    OwnPiece(Position),

    /// Cannon target is not on the same rank or file.
    #[display("Cannons capture along ranks or files only")]
    CannonNotAligned,

    /// Cannon did not have exactly one screen.
    #[display("Cannons must jump over exactly one piece to capture")]
    CannonScreen {
        /// Pieces found between attacker and target.
        found: usize,
    },

    /// Non-cannon capture is not one orthogonal square.
    #[display("Pieces capture by moving one square orthogonally")]
    NotOrthogonalCapture,

    /// Rank rules forbid this capture.
    #[display("Attacking piece cannot capture the defender")]
    RankTooLow {
        /// Capturing piece.
        attacker: Piece,
        /// Piece being captured.
        defender: Piece,
    },
}

impl ValidationError {
    /// Suggested response class.
    pub fn status(&self) -> StatusClass {
        match self {
            ValidationError::NotSeated | ValidationError::OpponentPiece(_) => {
                StatusClass::Forbidden
            }
            ValidationError::GameFull
            | ValidationError::SeatsLocked
            | ValidationError::WaitingForOpponent
            | ValidationError::GameFinished
            | ValidationError::NotYourTurn => StatusClass::Conflict,
            ValidationError::FirstMoveMustFlip
            | ValidationError::NotFaceDown(_)
            | ValidationError::NoFaceDownPieces
            | ValidationError::NoSourcePiece(_)
            | ValidationError::DestinationOccupied(_)
            | ValidationError::DestinationUnrevealed(_)
            | ValidationError::NotOrthogonalStep
            | ValidationError::NothingToCapture(_)
            | ValidationError::OwnPiece(_)
            | ValidationError::CannonNotAligned
            | ValidationError::CannonScreen { .. }
            | ValidationError::NotOrthogonalCapture
            | ValidationError::RankTooLow { .. } => StatusClass::BadRequest,
        }
    }
}

impl std::error::Error for ValidationError {}

/// The move log is structurally impossible; replay cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ReconstructionError {
    /// A flip targets a square that is not face down.
    #[display("Move {move_number}: cannot flip a cell that is already revealed or empty at {position}")]
    FlipOnRevealed {
        /// Offending log entry.
        move_number: u32,
        /// Flip target.
        position: Position,
    },

    /// A flip reveals a piece the hidden pool no longer holds.
    #[display("Move {move_number}: no remaining {piece} piece available to flip")]
    PoolExhausted {
        /// Offending log entry.
        move_number: u32,
        /// Piece the log claims was revealed.
        piece: Piece,
    },

    /// A move or capture starts from a square with no revealed piece.
    #[display("Move {move_number}: expected a revealed piece at {position}")]
    SourceNotRevealed {
        /// Offending log entry.
        move_number: u32,
        /// Source square.
        position: Position,
    },

    /// A step lands on a revealed piece.
    #[display("Move {move_number}: cannot perform a non-capturing move onto an occupied square at {position}")]
    DestinationOccupied {
        /// Offending log entry.
        move_number: u32,
        /// Destination square.
        position: Position,
    },

    /// A step lands on a face-down square.
    #[display("Move {move_number}: cannot move onto an unrevealed square at {position}")]
    DestinationUnrevealed {
        /// Offending log entry.
        move_number: u32,
        /// Destination square.
        position: Position,
    },

    /// A capture targets a square with no revealed piece.
    #[display("Move {move_number}: expected a revealed piece to capture at {position}")]
    NothingToCapture {
        /// Offending log entry.
        move_number: u32,
        /// Target square.
        position: Position,
    },
}

impl std::error::Error for ReconstructionError {}
