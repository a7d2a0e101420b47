//! Pool conservation: no piece is created or destroyed.

use super::Invariant;
use crate::{BoardState, TOTAL_PIECES};
use tracing::{instrument, warn};

/// Invariant: hidden + revealed + captured pieces always total 32.
pub struct PoolConservationInvariant;

impl Invariant<BoardState> for PoolConservationInvariant {
    #[instrument(skip(state))]
    fn holds(state: &BoardState) -> bool {
        let hidden = state.face_down_pieces().len();
        let revealed = state.board().revealed().count();
        let captured = state.captures().len();
        let total = hidden + revealed + captured;

        let valid = total == TOTAL_PIECES;
        if !valid {
            warn!(hidden, revealed, captured, total, "Pool conservation violated");
        }
        valid
    }

    fn description() -> &'static str {
        "Hidden, revealed and captured pieces must total 32"
    }
}
