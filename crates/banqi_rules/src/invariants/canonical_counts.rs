//! Canonical class counts across the three piece buckets.

use super::Invariant;
use crate::{BoardState, Color, Piece, PieceKind};
use strum::IntoEnumIterator;
use tracing::{instrument, warn};

/// Invariant: for every `(type, color)` class, the pieces found face down,
/// on the board and in either capture list add up to the starting count.
pub struct CanonicalCountsInvariant;

impl Invariant<BoardState> for CanonicalCountsInvariant {
    #[instrument(skip(state))]
    fn holds(state: &BoardState) -> bool {
        let mut valid = true;
        for color in Color::iter() {
            for kind in PieceKind::iter() {
                let piece = Piece::new(kind, color);
                let hidden = state.face_down_pieces().count(piece);
                let revealed = state.board().revealed().filter(|p| *p == piece).count();
                let captured = Color::iter()
                    .map(|by| state.captures().by(by).iter().filter(|p| **p == piece).count())
                    .sum::<usize>();
                let total = hidden + revealed + captured;
                if total != kind.count_per_color() {
                    warn!(%piece, hidden, revealed, captured, "Class count violated");
                    valid = false;
                }
            }
        }
        valid
    }

    fn description() -> &'static str {
        "Every piece class must keep its starting count across hidden, revealed and captured"
    }
}
