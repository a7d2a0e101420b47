//! Movement geometry and capture eligibility.

use super::{Board, Piece, PieceKind, Position};
use tracing::instrument;

/// True when `to` is exactly one square up, down, left or right of `from`.
pub fn is_orthogonally_adjacent(from: Position, to: Position) -> bool {
    from.distance(to) == 1
}

/// True when both squares share a rank (row) or file (column).
pub fn is_same_line(from: Position, to: Position) -> bool {
    from.row() == to.row() || from.col() == to.col()
}

/// Counts squares strictly between `from` and `to` that hold a piece,
/// revealed or face down.
///
/// Returns `None` when the squares do not share a row or column.
#[instrument(skip(board))]
pub fn pieces_between(board: &Board, from: Position, to: Position) -> Option<usize> {
    if !is_same_line(from, to) {
        return None;
    }

    let (row_lo, row_hi) = ordered(from.row(), to.row());
    let (col_lo, col_hi) = ordered(from.col(), to.col());

    let count = Position::all()
        .filter(|pos| pos.row() >= row_lo && pos.row() <= row_hi)
        .filter(|pos| pos.col() >= col_lo && pos.col() <= col_hi)
        .filter(|pos| *pos != from && *pos != to)
        .filter(|pos| board.get(*pos).is_screen())
        .count();
    Some(count)
}

fn ordered(a: u8, b: u8) -> (u8, u8) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Whether `attacker` may take `defender`, ignoring path and color.
///
/// Cannons take anything, pawns take kings, kings never take pawns;
/// otherwise the attacker's rank must be at least the defender's.
pub fn can_capture(attacker: Piece, defender: Piece) -> bool {
    match (attacker.kind, defender.kind) {
        (PieceKind::Cannon, _) => true,
        (PieceKind::Pawn, PieceKind::King) => true,
        (PieceKind::King, PieceKind::Pawn) => false,
        (a, d) => a.rank() >= d.rank(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, Color};

    fn pos(row: i64, col: i64) -> Position {
        Position::new(row, col).unwrap()
    }

    fn piece(kind: PieceKind, color: Color) -> Piece {
        Piece::new(kind, color)
    }

    #[test]
    fn test_adjacency() {
        assert!(is_orthogonally_adjacent(pos(1, 1), pos(1, 2)));
        assert!(is_orthogonally_adjacent(pos(1, 1), pos(0, 1)));
        assert!(!is_orthogonally_adjacent(pos(1, 1), pos(2, 2)));
        assert!(!is_orthogonally_adjacent(pos(1, 1), pos(1, 3)));
        assert!(!is_orthogonally_adjacent(pos(1, 1), pos(1, 1)));
    }

    #[test]
    fn test_pieces_between_counts_hidden_and_revealed_but_not_empty() {
        let mut board = Board::new();
        board.set(pos(0, 1), Cell::Empty);
        board.set(
            pos(0, 2),
            Cell::Occupied {
                piece: piece(PieceKind::Horse, Color::Red),
            },
        );
        // (0,3) stays face down.
        assert_eq!(pieces_between(&board, pos(0, 0), pos(0, 4)), Some(2));
        assert_eq!(pieces_between(&board, pos(0, 4), pos(0, 0)), Some(2));
        assert_eq!(pieces_between(&board, pos(0, 0), pos(0, 2)), Some(0));
        assert_eq!(pieces_between(&board, pos(0, 0), pos(3, 0)), Some(2));
        assert_eq!(pieces_between(&board, pos(0, 0), pos(1, 1)), None);
    }

    #[test]
    fn test_rank_exceptions() {
        let red_pawn = piece(PieceKind::Pawn, Color::Red);
        let black_king = piece(PieceKind::King, Color::Black);
        assert!(can_capture(red_pawn, black_king));
        assert!(!can_capture(black_king, red_pawn));
        assert!(can_capture(
            piece(PieceKind::Cannon, Color::Red),
            piece(PieceKind::King, Color::Black)
        ));
    }

    #[test]
    fn test_rank_order() {
        let guard = piece(PieceKind::Guard, Color::Red);
        let cart = piece(PieceKind::Cart, Color::Black);
        assert!(can_capture(guard, cart));
        assert!(!can_capture(cart, guard));
        assert!(can_capture(cart, piece(PieceKind::Cart, Color::Red)));
        assert!(!can_capture(
            piece(PieceKind::Horse, Color::Red),
            piece(PieceKind::Elephant, Color::Black)
        ));
        assert!(can_capture(
            piece(PieceKind::Pawn, Color::Red),
            piece(PieceKind::Cannon, Color::Black)
        ));
    }
}
