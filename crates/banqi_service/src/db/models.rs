//! Database rows and their conversion to engine types.

use banqi_rules::{
    Color, GameDocument, Move, MoveKind, PartialGameDocument, Piece, PieceKind, Position,
    ResolvedMove,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::{error, instrument};

use crate::db::{StoreError, schema};

/// Game metadata row. The document is stored as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Getters, new)]
#[diesel(table_name = schema::games)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GameRow {
    id: String,
    document: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl GameRow {
    /// Serializes a game record into a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document cannot be serialized.
    #[instrument(skip(game))]
    pub fn from_document(game_id: &str, game: &GameDocument) -> Result<Self, StoreError> {
        let document = serde_json::to_string(game)
            .map_err(|e| StoreError::new(format!("Failed to encode game {}: {}", game_id, e)))?;
        Ok(Self::new(
            game_id.to_string(),
            document,
            game.created_at().naive_utc(),
            game.updated_at().naive_utc(),
        ))
    }

    /// Decodes the stored document, filling any missing fields with defaults.
    ///
    /// Missing timestamps come from the row's columns, so decoding the same
    /// row twice yields the same `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns a corrupt [`StoreError`] if the JSON does not parse.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn into_document(self, now: DateTime<Utc>) -> Result<GameDocument, StoreError> {
        let mut partial: PartialGameDocument =
            serde_json::from_str(&self.document).map_err(|e| {
                error!(error = %e, "Stored game document does not parse");
                StoreError::corrupt(format!("Game {}: unreadable document: {}", self.id, e))
            })?;
        partial.created_at.get_or_insert(self.created_at.and_utc());
        partial.updated_at.get_or_insert(self.updated_at.and_utc());
        Ok(GameDocument::sanitize(partial, now))
    }
}

/// One committed move.
///
/// Kind-specific columns are nullable; which ones are set depends on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Getters)]
#[diesel(table_name = schema::moves)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MoveRow {
    game_id: String,
    move_number: i32,
    player_id: String,
    kind: String,
    position_row: Option<i32>,
    position_col: Option<i32>,
    piece_type: Option<String>,
    piece_color: Option<String>,
    from_row: Option<i32>,
    from_col: Option<i32>,
    to_row: Option<i32>,
    to_col: Option<i32>,
    captured_type: Option<String>,
    captured_color: Option<String>,
    created_at: Option<NaiveDateTime>,
}

impl MoveRow {
    /// Flattens a committed move into a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the move number does not fit the column.
    #[instrument(skip(mv), fields(move_number = *mv.move_number()))]
    pub fn from_move(game_id: &str, mv: &Move) -> Result<Self, StoreError> {
        let move_number = i32::try_from(*mv.move_number()).map_err(|_| {
            StoreError::new(format!("Move number {} is out of range", mv.move_number()))
        })?;

        let mut row = Self {
            game_id: game_id.to_string(),
            move_number,
            player_id: mv.player_id().clone(),
            kind: mv.kind().as_ref().to_string(),
            position_row: None,
            position_col: None,
            piece_type: None,
            piece_color: None,
            from_row: None,
            from_col: None,
            to_row: None,
            to_col: None,
            captured_type: None,
            captured_color: None,
            created_at: mv.created_at().as_ref().map(|at| at.naive_utc()),
        };

        match *mv.action() {
            ResolvedMove::Flip { position, piece } => {
                row.position_row = Some(position.row().into());
                row.position_col = Some(position.col().into());
                row.piece_type = Some(piece.kind.as_ref().to_string());
                row.piece_color = Some(piece.color.as_ref().to_string());
            }
            ResolvedMove::Move { from, to } => {
                row.set_path(from, to);
            }
            ResolvedMove::Capture {
                from,
                to,
                captured_piece,
            } => {
                row.set_path(from, to);
                row.captured_type = Some(captured_piece.kind.as_ref().to_string());
                row.captured_color = Some(captured_piece.color.as_ref().to_string());
            }
        }
        Ok(row)
    }

    fn set_path(&mut self, from: Position, to: Position) {
        self.from_row = Some(from.row().into());
        self.from_col = Some(from.col().into());
        self.to_row = Some(to.row().into());
        self.to_col = Some(to.col().into());
    }

    /// Decodes the row back into a committed move.
    ///
    /// # Errors
    ///
    /// Returns a corrupt [`StoreError`] for an unknown move type, a missing
    /// kind-specific column, an unknown piece name or an off-board coordinate.
    #[instrument(skip(self), fields(game_id = %self.game_id, move_number = self.move_number))]
    pub fn into_move(self) -> Result<Move, StoreError> {
        let kind: MoveKind = self
            .kind
            .parse()
            .map_err(|_| self.corrupt(format!("unknown move type '{}'", self.kind)))?;

        let action = match kind {
            MoveKind::Flip => ResolvedMove::Flip {
                position: self.square("position", self.position_row, self.position_col)?,
                piece: self.piece(
                    "piece",
                    self.piece_type.as_deref(),
                    self.piece_color.as_deref(),
                )?,
            },
            MoveKind::Move => ResolvedMove::Move {
                from: self.square("from", self.from_row, self.from_col)?,
                to: self.square("to", self.to_row, self.to_col)?,
            },
            MoveKind::Capture => ResolvedMove::Capture {
                from: self.square("from", self.from_row, self.from_col)?,
                to: self.square("to", self.to_row, self.to_col)?,
                captured_piece: self.piece(
                    "capturedPiece",
                    self.captured_type.as_deref(),
                    self.captured_color.as_deref(),
                )?,
            },
        };

        let move_number = u32::try_from(self.move_number)
            .map_err(|_| self.corrupt("negative move number".to_string()))?;
        Ok(Move::new(
            move_number,
            self.player_id,
            self.created_at.map(|at| at.and_utc()),
            action,
        ))
    }

    fn square(
        &self,
        field: &str,
        row: Option<i32>,
        col: Option<i32>,
    ) -> Result<Position, StoreError> {
        let (Some(row), Some(col)) = (row, col) else {
            return Err(self.corrupt(format!("missing {}", field)));
        };
        Position::new(row.into(), col.into())
            .ok_or_else(|| self.corrupt(format!("{} ({}, {}) is off the board", field, row, col)))
    }

    fn piece(
        &self,
        field: &str,
        kind: Option<&str>,
        color: Option<&str>,
    ) -> Result<Piece, StoreError> {
        let (Some(kind), Some(color)) = (kind, color) else {
            return Err(self.corrupt(format!("missing {}", field)));
        };
        let kind: PieceKind = kind
            .parse()
            .map_err(|_| self.corrupt(format!("unknown piece type '{}'", kind)))?;
        let color: Color = color
            .parse()
            .map_err(|_| self.corrupt(format!("unknown piece color '{}'", color)))?;
        Ok(Piece::new(kind, color))
    }

    #[track_caller]
    fn corrupt(&self, detail: String) -> StoreError {
        error!(game_id = %self.game_id, move_number = self.move_number, %detail, "Corrupt move row");
        StoreError::corrupt(format!(
            "Game {} move {}: {}",
            self.game_id, self.move_number, detail
        ))
    }
}
