//! Storage seam for game records and move logs.

use banqi_rules::{GameDocument, Move};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::db::StoreError;

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The write was applied.
    Committed,
    /// The game changed since it was read; nothing was written.
    Conflict {
        /// Latest committed move number seen by the store.
        latest: u32,
    },
}

/// What a writer saw when it read a game: the log length and the record stamp.
///
/// Every write carries the revision it was based on and is refused if the
/// stored game has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    /// Latest committed move number.
    pub last_move_number: u32,
    /// `updated_at` of the stored record.
    pub updated_at: DateTime<Utc>,
}

impl Revision {
    /// Revision of a record as loaded, before any local edits.
    pub fn of(game: &GameDocument, moves: &[Move]) -> Self {
        Self {
            last_move_number: moves.iter().map(|m| *m.move_number()).max().unwrap_or(0),
            updated_at: *game.updated_at(),
        }
    }
}

/// Persistence for game records and their append-only move logs.
///
/// Both writes are conditional on the [`Revision`] the caller read, and a
/// move is appended together with its updated record in one atomic step.
pub trait GameStore {
    /// Stores a new game record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be written or the id exists.
    fn create_game(&self, game_id: &str, game: &GameDocument) -> Result<(), StoreError>;

    /// Loads a game record, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure or an undecodable record.
    fn load_game(&self, game_id: &str) -> Result<Option<GameDocument>, StoreError>;

    /// Loads the committed moves in ascending move-number order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure or an undecodable move.
    fn load_moves(&self, game_id: &str) -> Result<Vec<Move>, StoreError>;

    /// Appends `mv` and replaces the record with `game`, if and only if the
    /// stored game is still at `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure or an unknown game. Losing the
    /// race is not an error.
    fn commit_move(
        &self,
        game_id: &str,
        mv: &Move,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError>;

    /// Replaces the record with `game` if the stored game is still at
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the game does not exist or the write fails.
    fn commit_metadata(
        &self,
        game_id: &str,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredGame {
    document: GameDocument,
    moves: Vec<Move>,
}

impl StoredGame {
    fn revision(&self) -> Revision {
        Revision::of(&self.document, &self.moves)
    }
}

/// In-process game store.
///
/// Clones share the same games. One mutex guards every game, so each
/// revision check and the write it guards happen under a single lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    games: Arc<Mutex<HashMap<String, StoredGame>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating MemoryStore");
        Self::default()
    }

    #[track_caller]
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredGame>>, StoreError> {
        self.games
            .lock()
            .map_err(|e| StoreError::new(format!("Store lock poisoned: {}", e)))
    }

    #[track_caller]
    fn missing(game_id: &str) -> StoreError {
        StoreError::new(format!("Game {} does not exist", game_id))
    }
}

impl GameStore for MemoryStore {
    #[instrument(skip(self, game))]
    fn create_game(&self, game_id: &str, game: &GameDocument) -> Result<(), StoreError> {
        let mut games = self.lock()?;
        if games.contains_key(game_id) {
            warn!("Game id already taken");
            return Err(StoreError::new(format!("Game {} already exists", game_id)));
        }
        games.insert(
            game_id.to_string(),
            StoredGame {
                document: game.clone(),
                moves: Vec::new(),
            },
        );
        info!("Game record created");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_game(&self, game_id: &str) -> Result<Option<GameDocument>, StoreError> {
        Ok(self.lock()?.get(game_id).map(|g| g.document.clone()))
    }

    #[instrument(skip(self))]
    fn load_moves(&self, game_id: &str) -> Result<Vec<Move>, StoreError> {
        let games = self.lock()?;
        let Some(game) = games.get(game_id) else {
            debug!("No moves for unknown game");
            return Ok(Vec::new());
        };
        let mut moves = game.moves.clone();
        moves.sort_by_key(|m| *m.move_number());
        Ok(moves)
    }

    #[instrument(skip(self, mv, game), fields(move_number = *mv.move_number()))]
    fn commit_move(
        &self,
        game_id: &str,
        mv: &Move,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        let mut games = self.lock()?;
        let stored = games.get_mut(game_id).ok_or_else(|| Self::missing(game_id))?;

        let current = stored.revision();
        if current != expected {
            warn!(?expected, ?current, "Move commit lost the race");
            return Ok(CommitOutcome::Conflict {
                latest: current.last_move_number,
            });
        }

        stored.moves.push(mv.clone());
        stored.document = game.clone();
        info!("Move committed");
        Ok(CommitOutcome::Committed)
    }

    #[instrument(skip(self, game))]
    fn commit_metadata(
        &self,
        game_id: &str,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        let mut games = self.lock()?;
        let stored = games.get_mut(game_id).ok_or_else(|| Self::missing(game_id))?;

        let current = stored.revision();
        if current != expected {
            warn!(?expected, ?current, "Stale game record not written");
            return Ok(CommitOutcome::Conflict {
                latest: current.last_move_number,
            });
        }

        stored.document = game.clone();
        debug!("Game record updated");
        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banqi_rules::{Color, Piece, PieceKind, Position, ResolvedMove};

    fn flip(n: u32, col: i64) -> Move {
        Move::new(
            n,
            "alice".to_string(),
            None,
            ResolvedMove::Flip {
                position: Position::new(0, col).unwrap(),
                piece: Piece::new(PieceKind::Pawn, Color::Red),
            },
        )
    }

    fn created(store: &MemoryStore) -> (GameDocument, Revision) {
        let game = GameDocument::new(Utc::now());
        store.create_game("g1", &game).unwrap();
        let rev = Revision::of(&game, &[]);
        (game, rev)
    }

    #[test]
    fn test_commit_requires_expected_revision() {
        let store = MemoryStore::new();
        let (game, rev) = created(&store);

        assert_eq!(
            store.commit_move("g1", &flip(1, 0), &game, rev).unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            store.commit_move("g1", &flip(1, 1), &game, rev).unwrap(),
            CommitOutcome::Conflict { latest: 1 }
        );
        assert_eq!(store.load_moves("g1").unwrap(), vec![flip(1, 0)]);
    }

    #[test]
    fn test_move_and_record_are_written_together() {
        let store = MemoryStore::new();
        let (mut game, rev) = created(&store);
        game.add_player("alice", Utc::now()).unwrap();

        store.commit_move("g1", &flip(1, 0), &game, rev).unwrap();
        assert_eq!(store.load_game("g1").unwrap(), Some(game));
    }

    #[test]
    fn test_stale_metadata_is_refused() {
        let store = MemoryStore::new();
        let (game, rev) = created(&store);

        let mut first = game.clone();
        first.add_player("alice", rev.updated_at + chrono::TimeDelta::seconds(1)).unwrap();
        assert_eq!(
            store.commit_metadata("g1", &first, rev).unwrap(),
            CommitOutcome::Committed
        );

        let mut second = game;
        second.add_player("bob", rev.updated_at + chrono::TimeDelta::seconds(2)).unwrap();
        assert_eq!(
            store.commit_metadata("g1", &second, rev).unwrap(),
            CommitOutcome::Conflict { latest: 0 }
        );
        assert_eq!(store.load_game("g1").unwrap(), Some(first));
    }

    #[test]
    fn test_clones_share_games() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.create_game("g1", &GameDocument::new(Utc::now())).unwrap();
        assert!(other.load_game("g1").unwrap().is_some());
        assert!(other.create_game("g1", &GameDocument::new(Utc::now())).is_err());
    }

    #[test]
    fn test_unknown_game() {
        let store = MemoryStore::new();
        let game = GameDocument::new(Utc::now());
        let rev = Revision::of(&game, &[]);
        assert!(store.load_game("nope").unwrap().is_none());
        assert!(store.load_moves("nope").unwrap().is_empty());
        assert!(store.commit_move("nope", &flip(1, 0), &game, rev).is_err());
        assert!(store.commit_metadata("nope", &game, rev).is_err());
    }
}
