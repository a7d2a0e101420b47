//! Game operations over a store and an authenticator.
//!
//! Every call reloads the game record and move log and rebuilds the board
//! from scratch; nothing is cached between calls. Colors and turn are then
//! re-derived from the log, so a lagging record cannot hand out an extra turn.
//! Every write is conditional on what was read, and a lost race is retried
//! against the fresh game.

use banqi_rules::{
    BoardState, GameDocument, JoinOutcome, Move, ProposedMove, ReconstructionError,
    StatusClass, ValidationError, reconstruct, validate,
};
use chrono::{DateTime, TimeDelta, Utc};
use derive_getters::Getters;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::Authenticator;
use crate::db::StoreError;
use crate::store::{CommitOutcome, GameStore, Revision};

/// Length of generated game ids.
const GAME_ID_LEN: usize = 12;

/// Failure of a service operation.
#[derive(Debug, Clone, derive_more::Display)]
pub enum ServiceError {
    /// No valid credential.
    #[display("Missing or invalid credential")]
    Unauthorized,

    /// The game does not exist.
    #[display("Game {_0} not found")]
    NotFound(String),

    /// The request broke a game rule.
    #[display("{_0}")]
    Rejected(ValidationError),

    /// Every commit attempt lost a race with another move.
    #[display("Game changed concurrently; move not committed after {attempts} attempts")]
    Conflict {
        /// Commit attempts made.
        attempts: u32,
    },

    /// The stored move log cannot be replayed.
    #[display("Move log is corrupted: {_0}")]
    Corrupted(ReconstructionError),

    /// Persistence failed.
    #[display("{_0}")]
    Store(StoreError),
}

impl ServiceError {
    /// Suggested response class.
    pub fn status(&self) -> StatusClass {
        match self {
            ServiceError::Unauthorized => StatusClass::Unauthorized,
            ServiceError::NotFound(_) => StatusClass::NotFound,
            ServiceError::Rejected(e) => e.status(),
            ServiceError::Conflict { .. } => StatusClass::Conflict,
            ServiceError::Corrupted(_) | ServiceError::Store(_) => StatusClass::Internal,
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Rejected(e) => Some(e),
            ServiceError::Corrupted(e) => Some(e),
            ServiceError::Store(e) => Some(e),
            ServiceError::Unauthorized
            | ServiceError::NotFound(_)
            | ServiceError::Conflict { .. } => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Rejected(err)
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Store(err)
    }
}

impl From<ReconstructionError> for ServiceError {
    fn from(err: ReconstructionError) -> Self {
        ServiceError::Corrupted(err)
    }
}

/// A game as seen after an operation: record, rebuilt board and full log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    /// Game id.
    game_id: String,
    /// Seating and turn record.
    game: GameDocument,
    /// Board rebuilt from `moves`.
    state: BoardState,
    /// Committed moves in order.
    moves: Vec<Move>,
}

/// Banqi game operations.
#[derive(Debug, Clone)]
pub struct GameService<S, A> {
    store: S,
    auth: A,
    max_commit_attempts: u32,
}

impl<S, A> GameService<S, A>
where
    S: GameStore,
    A: Authenticator,
{
    /// Creates a service. `max_commit_attempts` is clamped to at least one.
    #[instrument(skip(store, auth))]
    pub fn new(store: S, auth: A, max_commit_attempts: u32) -> Self {
        Self {
            store,
            auth,
            max_commit_attempts: max_commit_attempts.max(1),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a game with the caller in the first seat.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unauthorized`] or a store failure.
    #[instrument(skip(self, credential))]
    pub fn create_game(&self, credential: &str) -> Result<GameView, ServiceError> {
        let player = self.auth.authenticate(credential)?;
        let now = Utc::now();
        let mut game = GameDocument::new(now);
        game.add_player(&player, now)?;

        let game_id = new_game_id();
        self.store.create_game(&game_id, &game)?;
        info!(%game_id, %player, "Game created");
        Ok(GameView {
            game_id,
            game,
            state: BoardState::initial(),
            moves: Vec::new(),
        })
    }

    /// Takes a free seat. Joining a game you already sit in changes nothing.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Rejected`] with [`ValidationError::GameFull`] when both
    /// seats are taken by others.
    #[instrument(skip(self, credential))]
    pub fn join_game(&self, credential: &str, game_id: &str) -> Result<GameView, ServiceError> {
        let player = self.auth.authenticate(credential)?;
        self.update_record(game_id, |game, now| {
            let joined = game.add_player(&player, now)? == JoinOutcome::Joined;
            if joined {
                info!(%player, "Player joined");
            }
            Ok(joined)
        })
    }

    /// Gives up a seat before colors are assigned.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Rejected`] with [`ValidationError::SeatsLocked`] once
    /// the first flip has been made.
    #[instrument(skip(self, credential))]
    pub fn leave_game(&self, credential: &str, game_id: &str) -> Result<GameView, ServiceError> {
        let player = self.auth.authenticate(credential)?;
        self.update_record(game_id, |game, now| {
            let left = game.remove_player(&player, now)?;
            if left {
                info!(%player, "Player left");
            } else {
                debug!(%player, "Leave from unseated player ignored");
            }
            Ok(left)
        })
    }

    /// Sets the caller's ready flag.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Rejected`] with [`ValidationError::NotSeated`] if the
    /// caller holds no seat.
    #[instrument(skip(self, credential))]
    pub fn set_ready(
        &self,
        credential: &str,
        game_id: &str,
        ready: bool,
    ) -> Result<GameView, ServiceError> {
        let player = self.auth.authenticate(credential)?;
        self.update_record(game_id, |game, now| {
            if !game.set_ready(&player, ready, now) {
                warn!(%player, "Ready toggle from unseated player");
                return Err(ServiceError::Rejected(ValidationError::NotSeated));
            }
            Ok(true)
        })
    }

    /// Current record, board and log.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown game,
    /// [`ServiceError::Corrupted`] if the log cannot be replayed.
    #[instrument(skip(self, credential))]
    pub fn game_view(&self, credential: &str, game_id: &str) -> Result<GameView, ServiceError> {
        self.auth.authenticate(credential)?;
        let (game, moves, state, _) = self.load(game_id)?;
        Ok(self.view(game_id, game, state, moves))
    }

    /// Validates and commits a move for the caller.
    ///
    /// Flips draw their piece from `rng`. The move and the updated record are
    /// committed together. If the game changed between reconstruction and
    /// commit, the whole check is redone against the new log, up to the
    /// configured number of attempts.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Rejected`] for a rule violation,
    /// [`ServiceError::Conflict`] if every attempt lost the race.
    #[instrument(skip(self, credential, rng))]
    pub fn submit_move<R: Rng + ?Sized>(
        &self,
        credential: &str,
        game_id: &str,
        proposed: &ProposedMove,
        rng: &mut R,
    ) -> Result<GameView, ServiceError> {
        let player = self.auth.authenticate(credential)?;

        for attempt in 1..=self.max_commit_attempts {
            let (mut game, mut moves, state, revision) = self.load(game_id)?;
            let prior = *state.last_move_number();

            game.authorize(&player, proposed, prior)?;
            let resolved = validate(proposed, &state, &game, &player, rng)?;

            let now = stamp_after(&game);
            let number = state.next_move_number();
            let mv = Move::new(number, player.clone(), Some(now), resolved);
            let colors = game.record_move(&player, &resolved, number, now);

            match self.store.commit_move(game_id, &mv, &game, revision)? {
                CommitOutcome::Committed => {
                    if let Some(colors) = colors {
                        info!(red = ?colors.red, black = ?colors.black, "Colors fixed by first flip");
                    }
                    moves.push(mv);
                    let state = self.rebuild(&moves)?;
                    info!(%player, move_number = number, %resolved, "Move accepted");
                    return Ok(self.view(game_id, game, state, moves));
                }
                CommitOutcome::Conflict { latest } => {
                    warn!(attempt, latest, "Commit conflict, reloading");
                }
            }
        }

        Err(ServiceError::Conflict {
            attempts: self.max_commit_attempts,
        })
    }

    /// Applies `edit` to a fresh copy of the record and writes it back if the
    /// game has not changed meanwhile, retrying on a lost race. `edit` returns
    /// false when there is nothing to write.
    fn update_record<F>(&self, game_id: &str, mut edit: F) -> Result<GameView, ServiceError>
    where
        F: FnMut(&mut GameDocument, DateTime<Utc>) -> Result<bool, ServiceError>,
    {
        for attempt in 1..=self.max_commit_attempts {
            let (mut game, moves, state, revision) = self.load(game_id)?;
            let now = stamp_after(&game);
            if !edit(&mut game, now)? {
                return Ok(self.view(game_id, game, state, moves));
            }

            match self.store.commit_metadata(game_id, &game, revision)? {
                CommitOutcome::Committed => return Ok(self.view(game_id, game, state, moves)),
                CommitOutcome::Conflict { latest } => {
                    warn!(attempt, latest, "Game record changed, reloading");
                }
            }
        }

        Err(ServiceError::Conflict {
            attempts: self.max_commit_attempts,
        })
    }

    /// Loads a game and rebuilds its board. The record's derived fields are
    /// corrected against the log; the returned revision is the one read.
    #[instrument(skip(self))]
    fn load(
        &self,
        game_id: &str,
    ) -> Result<(GameDocument, Vec<Move>, BoardState, Revision), ServiceError> {
        let mut game = self.store.load_game(game_id)?.ok_or_else(|| {
            debug!("Unknown game");
            ServiceError::NotFound(game_id.to_string())
        })?;
        let moves = self.store.load_moves(game_id)?;
        let state = self.rebuild(&moves)?;
        let revision = Revision::of(&game, &moves);
        game.reconcile(&moves);
        Ok((game, moves, state, revision))
    }

    fn rebuild(&self, moves: &[Move]) -> Result<BoardState, ServiceError> {
        reconstruct(moves).map_err(|e| {
            error!(error = %e, "Committed log does not replay");
            ServiceError::Corrupted(e)
        })
    }

    fn view(
        &self,
        game_id: &str,
        game: GameDocument,
        state: BoardState,
        moves: Vec<Move>,
    ) -> GameView {
        GameView {
            game_id: game_id.to_string(),
            game,
            state,
            moves,
        }
    }
}

/// A timestamp strictly after the record's last update, so every write
/// changes the revision.
fn stamp_after(game: &GameDocument) -> DateTime<Utc> {
    let now = Utc::now();
    if now > *game.updated_at() {
        now
    } else {
        *game.updated_at() + TimeDelta::microseconds(1)
    }
}

/// Random alphanumeric game id.
fn new_game_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(GAME_ID_LEN)
        .map(char::from)
        .collect()
}
