//! Move validation as a composition of preconditions.
//!
//! Each precondition is a small checker that either passes (possibly yielding
//! the piece it inspected) or rejects with a specific [`ValidationError`].
//! [`validate`] strings them together per move kind. Validation never mutates
//! the snapshot or the game record.

use super::action::{ProposedMove, ResolvedMove};
use super::error::ValidationError;
use super::game::GameDocument;
use super::rules::{can_capture, is_orthogonally_adjacent, is_same_line, pieces_between};
use super::state::BoardState;
use super::{Cell, Color, Piece, PieceKind, Position};
use rand::Rng;
use tracing::{debug, instrument, warn};

// ─────────────────────────────────────────────────────────────
//  Preconditions
// ─────────────────────────────────────────────────────────────

/// Precondition: the actor plays a known color.
pub struct PlayerHasColor;

impl PlayerHasColor {
    /// Returns the actor's color.
    #[instrument(skip(game))]
    pub fn check(game: &GameDocument, player_id: &str) -> Result<Color, ValidationError> {
        game.color_of(player_id).ok_or(ValidationError::NotSeated)
    }
}

/// Precondition: the flip target is face down.
pub struct TargetIsFaceDown;

impl TargetIsFaceDown {
    /// Fails unless the square holds an unrevealed piece.
    #[instrument(skip(state))]
    pub fn check(state: &BoardState, position: Position) -> Result<(), ValidationError> {
        match state.cell(position) {
            Cell::Unknown => Ok(()),
            Cell::Empty | Cell::Occupied { .. } => Err(ValidationError::NotFaceDown(position)),
        }
    }
}

/// Precondition: the source holds a revealed piece of the actor's color.
pub struct SourceIsOwnPiece;

impl SourceIsOwnPiece {
    /// Returns the piece being moved.
    #[instrument(skip(state))]
    pub fn check(
        state: &BoardState,
        from: Position,
        color: Color,
    ) -> Result<Piece, ValidationError> {
        let piece = state
            .cell(from)
            .piece()
            .ok_or(ValidationError::NoSourcePiece(from))?;
        if piece.color != color {
            return Err(ValidationError::OpponentPiece(from));
        }
        Ok(piece)
    }
}

/// Precondition: a step lands on a revealed empty square.
pub struct DestinationIsEmpty;

impl DestinationIsEmpty {
    /// Fails unless the destination square is empty.
    #[instrument(skip(state))]
    pub fn check(state: &BoardState, to: Position) -> Result<(), ValidationError> {
        match state.cell(to) {
            Cell::Empty => Ok(()),
            Cell::Occupied { .. } => Err(ValidationError::DestinationOccupied(to)),
            Cell::Unknown => Err(ValidationError::DestinationUnrevealed(to)),
        }
    }
}

/// Precondition: a step covers exactly one orthogonal square.
///
/// Every piece, the cannon included, steps this way when not capturing.
pub struct OrthogonalStep;

impl OrthogonalStep {
    /// Fails unless `to` is one orthogonal step from `from`.
    #[instrument]
    pub fn check(from: Position, to: Position) -> Result<(), ValidationError> {
        if is_orthogonally_adjacent(from, to) {
            Ok(())
        } else {
            Err(ValidationError::NotOrthogonalStep)
        }
    }
}

/// Precondition: the capture target is a revealed opposing piece.
pub struct TargetIsOpponent;

impl TargetIsOpponent {
    /// Returns the defender.
    #[instrument(skip(state))]
    pub fn check(state: &BoardState, to: Position, color: Color) -> Result<Piece, ValidationError> {
        let defender = state
            .cell(to)
            .piece()
            .ok_or(ValidationError::NothingToCapture(to))?;
        if defender.color == color {
            return Err(ValidationError::OwnPiece(to));
        }
        Ok(defender)
    }
}

/// Precondition: the attacker can reach the target.
///
/// Cannons jump along a rank or file over exactly one piece, revealed or
/// face down. Everything else captures one orthogonal square away.
pub struct CapturePath;

impl CapturePath {
    /// Checks reach: adjacency, or exactly one screen for a cannon.
    #[instrument(skip(state))]
    pub fn check(
        state: &BoardState,
        from: Position,
        to: Position,
        attacker: Piece,
    ) -> Result<(), ValidationError> {
        if attacker.kind != PieceKind::Cannon {
            return if is_orthogonally_adjacent(from, to) {
                Ok(())
            } else {
                Err(ValidationError::NotOrthogonalCapture)
            };
        }

        if !is_same_line(from, to) {
            return Err(ValidationError::CannonNotAligned);
        }
        match pieces_between(state.board(), from, to) {
            Some(1) => Ok(()),
            Some(found) => Err(ValidationError::CannonScreen { found }),
            None => Err(ValidationError::CannonNotAligned),
        }
    }
}

/// Precondition: rank rules allow the capture.
pub struct RankAllows;

impl RankAllows {
    /// Fails when the attacker may not take the defender.
    #[instrument]
    pub fn check(attacker: Piece, defender: Piece) -> Result<(), ValidationError> {
        if can_capture(attacker, defender) {
            Ok(())
        } else {
            Err(ValidationError::RankTooLow { attacker, defender })
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Validation entry point
// ─────────────────────────────────────────────────────────────

/// Validates a proposed move against the current snapshot and resolves it.
///
/// Flips draw their piece uniformly from the remaining face-down pool using
/// `rng`; this is the only randomized step in the engine. Captures carry a
/// copy of the defender.
///
/// Seating and turn order are checked separately by
/// [`GameDocument::authorize`].
///
/// # Errors
///
/// The first precondition the move fails.
#[instrument(skip(state, game, rng), fields(last_move = *state.last_move_number()))]
pub fn validate<R: Rng + ?Sized>(
    proposed: &ProposedMove,
    state: &BoardState,
    game: &GameDocument,
    player_id: &str,
    rng: &mut R,
) -> Result<ResolvedMove, ValidationError> {
    let result = match *proposed {
        ProposedMove::Flip { position } => validate_flip(state, position, rng),
        ProposedMove::Move { from, to } => validate_step(state, game, player_id, from, to),
        ProposedMove::Capture { from, to } => validate_capture(state, game, player_id, from, to),
    };

    match &result {
        Ok(resolved) => debug!(%resolved, "Move validated"),
        Err(err) => warn!(error = %err, "Move rejected"),
    }
    result
}

fn validate_flip<R: Rng + ?Sized>(
    state: &BoardState,
    position: Position,
    rng: &mut R,
) -> Result<ResolvedMove, ValidationError> {
    TargetIsFaceDown::check(state, position)?;
    let piece = state
        .face_down_pieces()
        .draw(rng)
        .ok_or(ValidationError::NoFaceDownPieces)?;
    Ok(ResolvedMove::Flip { position, piece })
}

fn validate_step(
    state: &BoardState,
    game: &GameDocument,
    player_id: &str,
    from: Position,
    to: Position,
) -> Result<ResolvedMove, ValidationError> {
    let color = PlayerHasColor::check(game, player_id)?;
    SourceIsOwnPiece::check(state, from, color)?;
    DestinationIsEmpty::check(state, to)?;
    OrthogonalStep::check(from, to)?;
    Ok(ResolvedMove::Move { from, to })
}

fn validate_capture(
    state: &BoardState,
    game: &GameDocument,
    player_id: &str,
    from: Position,
    to: Position,
) -> Result<ResolvedMove, ValidationError> {
    let color = PlayerHasColor::check(game, player_id)?;
    let attacker = SourceIsOwnPiece::check(state, from, color)?;
    let defender = TargetIsOpponent::check(state, to, color)?;
    CapturePath::check(state, from, to, attacker)?;
    RankAllows::check(attacker, defender)?;
    Ok(ResolvedMove::Capture {
        from,
        to,
        captured_piece: defender,
    })
}
