//! Board reconstruction from the committed move log.
//!
//! The board is never stored. Every read replays the full log from the
//! all-face-down opening, so the snapshot is a pure function of the moves.

use super::action::{Move, ResolvedMove};
use super::error::ReconstructionError;
use super::{Board, Cell, Color, Piece, PiecePool, Position};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

/// Pieces taken so far, keyed by the color that took them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captures {
    /// Pieces red has captured.
    pub red: Vec<Piece>,
    /// Pieces black has captured.
    pub black: Vec<Piece>,
}

impl Captures {
    /// Pieces captured by `color`.
    pub fn by(&self, color: Color) -> &[Piece] {
        match color {
            Color::Red => &self.red,
            Color::Black => &self.black,
        }
    }

    fn push(&mut self, attacker: Color, piece: Piece) {
        match attacker {
            Color::Red => self.red.push(piece),
            Color::Black => self.black.push(piece),
        }
    }

    /// Total pieces captured by either side.
    pub fn len(&self) -> usize {
        self.red.len() + self.black.len()
    }

    /// True when nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.red.is_empty() && self.black.is_empty()
    }
}

/// Snapshot of a game, derived from its move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    /// The 4×8 grid.
    board: Board,
    /// Captured pieces per capturing color.
    captures: Captures,
    /// Highest move number replayed, 0 for a fresh game.
    last_move_number: u32,
    /// Pieces still face down.
    face_down_pieces: PiecePool,
}

impl BoardState {
    /// The opening snapshot: all face down, full pool, nothing captured.
    #[instrument]
    pub fn initial() -> Self {
        Self {
            board: Board::new(),
            captures: Captures::default(),
            last_move_number: 0,
            face_down_pieces: PiecePool::full(),
        }
    }

    /// Assembles a snapshot from parts.
    ///
    /// Used by callers that stage positions directly, e.g. puzzles and tests.
    pub fn from_parts(
        board: Board,
        captures: Captures,
        last_move_number: u32,
        face_down_pieces: PiecePool,
    ) -> Self {
        Self {
            board,
            captures,
            last_move_number,
            face_down_pieces,
        }
    }

    /// Cell at a position.
    pub fn cell(&self, pos: Position) -> Cell {
        self.board.get(pos)
    }

    /// Move number the next committed move must take.
    pub fn next_move_number(&self) -> u32 {
        self.last_move_number + 1
    }

    #[instrument(skip(self, mv), fields(move_number = *mv.move_number()))]
    fn apply(&mut self, mv: &Move) -> Result<(), ReconstructionError> {
        let move_number = *mv.move_number();
        match *mv.action() {
            ResolvedMove::Flip { position, piece } => {
                if self.board.get(position) != Cell::Unknown {
                    return Err(ReconstructionError::FlipOnRevealed {
                        move_number,
                        position,
                    });
                }
                self.board.set(position, Cell::Occupied { piece });
                if !self.face_down_pieces.take(piece) {
                    return Err(ReconstructionError::PoolExhausted { move_number, piece });
                }
            }
            ResolvedMove::Move { from, to } => {
                let piece = self.source_piece(move_number, from)?;
                match self.board.get(to) {
                    Cell::Empty => {}
                    Cell::Occupied { .. } => {
                        return Err(ReconstructionError::DestinationOccupied {
                            move_number,
                            position: to,
                        });
                    }
                    Cell::Unknown => {
                        return Err(ReconstructionError::DestinationUnrevealed {
                            move_number,
                            position: to,
                        });
                    }
                }
                self.board.set(from, Cell::Empty);
                self.board.set(to, Cell::Occupied { piece });
            }
            ResolvedMove::Capture {
                from,
                to,
                captured_piece,
            } => {
                let piece = self.source_piece(move_number, from)?;
                let Some(on_board) = self.board.get(to).piece() else {
                    return Err(ReconstructionError::NothingToCapture {
                        move_number,
                        position: to,
                    });
                };
                if on_board != captured_piece {
                    warn!(%on_board, %captured_piece, "Recorded capture disagrees with board");
                }
                self.captures.push(piece.color, on_board);
                self.board.set(from, Cell::Empty);
                self.board.set(to, Cell::Occupied { piece });
            }
        }
        self.last_move_number = self.last_move_number.max(move_number);
        Ok(())
    }

    fn source_piece(&self, move_number: u32, from: Position) -> Result<Piece, ReconstructionError> {
        self.board
            .get(from)
            .piece()
            .ok_or(ReconstructionError::SourceNotRevealed {
                move_number,
                position: from,
            })
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Replays a move log into a board snapshot.
///
/// Moves are applied in ascending move-number order regardless of input order.
/// Any structural impossibility aborts the replay: the log is corrupt and no
/// partial board is returned.
#[instrument(skip(moves), fields(count = moves.len()))]
pub fn reconstruct(moves: &[Move]) -> Result<BoardState, ReconstructionError> {
    let mut ordered: Vec<&Move> = moves.iter().collect();
    ordered.sort_by_key(|mv| *mv.move_number());

    let mut state = BoardState::initial();
    for mv in ordered {
        if let Err(err) = state.apply(mv) {
            error!(error = %err, "Move log is corrupt");
            return Err(err);
        }
    }

    #[cfg(debug_assertions)]
    {
        use super::invariants::{BanqiInvariants, InvariantSet};
        if let Err(violations) = BanqiInvariants::check_all(&state) {
            for violation in &violations {
                error!(invariant = %violation.description, "Invariant violated after replay");
            }
        }
    }

    debug!(
        last_move_number = state.last_move_number,
        face_down = state.face_down_pieces.len(),
        captured = state.captures.len(),
        "Board reconstructed"
    );
    Ok(state)
}
