//! SQLite-backed game store.

use banqi_rules::{GameDocument, Move};
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument, warn};

use crate::db::{GameRow, MoveRow, StoreError, schema};
use crate::store::{CommitOutcome, GameStore, Revision};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Game store persisting to a SQLite file.
///
/// Each call opens its own connection, so the store is cheap to clone and
/// share. An in-memory path (`":memory:"`) would give every call a fresh empty
/// database; use [`MemoryStore`](crate::MemoryStore) for that instead.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
}

impl SqliteStore {
    /// Opens the database at `db_path`, creating it and applying pending
    /// migrations as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn open(db_path: impl AsRef<str>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_string(),
        };
        let mut conn = store.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("Migrations failed: {}", e)))?;
        info!(path = %store.db_path, applied = applied.len(), "SqliteStore ready");
        Ok(store)
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, StoreError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            StoreError::new(format!("Failed to connect to '{}': {}", self.db_path, e))
        })?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }
}

/// Reads the game's current revision inside the caller's transaction.
fn current_revision(conn: &mut SqliteConnection, game_id: &str) -> Result<Revision, StoreError> {
    let row = schema::games::table
        .find(game_id)
        .select(GameRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| StoreError::new(format!("Game {} does not exist", game_id)))?;
    let updated_at = *row.into_document(Utc::now())?.updated_at();

    let latest: Option<i32> = schema::moves::table
        .filter(schema::moves::game_id.eq(game_id))
        .select(max(schema::moves::move_number))
        .get_result(conn)?;
    let last_move_number = latest.map_or(Ok(0), u32::try_from).map_err(|_| {
        StoreError::corrupt(format!("Game {}: negative move number in log", game_id))
    })?;

    Ok(Revision {
        last_move_number,
        updated_at,
    })
}

fn write_document(
    conn: &mut SqliteConnection,
    game_id: &str,
    game: &GameDocument,
) -> Result<(), StoreError> {
    let row = GameRow::from_document(game_id, game)?;
    diesel::update(schema::games::table.find(game_id))
        .set((
            schema::games::document.eq(row.document().as_str()),
            schema::games::updated_at.eq(*row.updated_at()),
        ))
        .execute(conn)?;
    Ok(())
}

fn log_outcome(outcome: CommitOutcome, expected: Revision, what: &str) {
    match outcome {
        CommitOutcome::Committed => info!("{} committed", what),
        CommitOutcome::Conflict { latest } => {
            warn!(?expected, latest, "{} lost the race", what)
        }
    }
}

impl GameStore for SqliteStore {
    #[instrument(skip(self, game))]
    fn create_game(&self, game_id: &str, game: &GameDocument) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let row = GameRow::from_document(game_id, game)?;
        diesel::insert_into(schema::games::table)
            .values(&row)
            .execute(&mut conn)?;
        info!("Game record created");
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_game(&self, game_id: &str) -> Result<Option<GameDocument>, StoreError> {
        let mut conn = self.connection()?;
        let row = schema::games::table
            .find(game_id)
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()?;

        match row {
            Some(row) => row.into_document(Utc::now()).map(Some),
            None => {
                debug!("Game not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    fn load_moves(&self, game_id: &str) -> Result<Vec<Move>, StoreError> {
        let mut conn = self.connection()?;
        let rows = schema::moves::table
            .filter(schema::moves::game_id.eq(game_id))
            .order(schema::moves::move_number.asc())
            .select(MoveRow::as_select())
            .load(&mut conn)?;

        debug!(count = rows.len(), "Move rows loaded");
        rows.into_iter().map(MoveRow::into_move).collect()
    }

    #[instrument(skip(self, mv, game), fields(move_number = *mv.move_number()))]
    fn commit_move(
        &self,
        game_id: &str,
        mv: &Move,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        let row = MoveRow::from_move(game_id, mv)?;
        let mut conn = self.connection()?;

        // IMMEDIATE takes the write lock up front, so the check, the insert
        // and the record update cannot interleave with another writer.
        let outcome = conn.immediate_transaction(|conn| -> Result<CommitOutcome, StoreError> {
            let current = current_revision(conn, game_id)?;
            if current != expected {
                return Ok(CommitOutcome::Conflict {
                    latest: current.last_move_number,
                });
            }

            match diesel::insert_into(schema::moves::table)
                .values(&row)
                .execute(conn)
            {
                Ok(_) => {}
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    return Ok(CommitOutcome::Conflict {
                        latest: expected.last_move_number + 1,
                    });
                }
                Err(e) => return Err(e.into()),
            }
            write_document(conn, game_id, game)?;
            Ok(CommitOutcome::Committed)
        })?;

        log_outcome(outcome, expected, "Move");
        Ok(outcome)
    }

    #[instrument(skip(self, game))]
    fn commit_metadata(
        &self,
        game_id: &str,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        let mut conn = self.connection()?;
        let outcome = conn.immediate_transaction(|conn| -> Result<CommitOutcome, StoreError> {
            let current = current_revision(conn, game_id)?;
            if current != expected {
                return Ok(CommitOutcome::Conflict {
                    latest: current.last_move_number,
                });
            }
            write_document(conn, game_id, game)?;
            Ok(CommitOutcome::Committed)
        })?;

        log_outcome(outcome, expected, "Game record");
        Ok(outcome)
    }
}
