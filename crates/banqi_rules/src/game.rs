//! Seating and turn management over the game metadata record.
//!
//! Colors are not chosen up front. Whoever makes the game's first flip takes
//! the color that flip revealed, the opponent takes the other, and from then
//! on turns strictly alternate between the two seats.

use super::action::{Move, PlayerId, ProposedMove, ResolvedMove};
use super::error::ValidationError;
use super::{Color, MoveKind};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Maximum number of seats in a game.
pub const MAX_PLAYERS: usize = 2;

/// Lifecycle of a game.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameStatus {
    /// Seats are filling; no move yet.
    #[default]
    Waiting,
    /// At least one move has been accepted.
    InProgress,
    /// Ended by an external game-over decision.
    Finished,
}

/// A player holding one of the two seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct SeatedPlayer {
    /// Player id.
    id: PlayerId,
    /// Whether the player marked themselves ready.
    ready: bool,
    /// When the player took the seat.
    joined_at: DateTime<Utc>,
}

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The player took a free seat.
    Joined,
    /// The player already held a seat; nothing changed.
    AlreadySeated,
}

/// Seat-to-color binding produced by the first flip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorAssignment {
    /// Player playing red.
    pub red: Option<PlayerId>,
    /// Player playing black.
    pub black: Option<PlayerId>,
}

/// Seating and turn metadata for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    /// Seated players in join order, at most two.
    players: Vec<SeatedPlayer>,
    /// Red player, once the first flip assigned colors.
    player_red_id: Option<PlayerId>,
    /// Black player, once the first flip assigned colors.
    player_black_id: Option<PlayerId>,
    /// Who made the game's first move.
    first_player_id: Option<PlayerId>,
    /// Who must move next, once colors are assigned.
    current_turn: Option<PlayerId>,
    /// Lifecycle status.
    status: GameStatus,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// Last modification time.
    updated_at: DateTime<Utc>,
    /// Number of the last committed move.
    last_move_number: u32,
    /// Winning color, set by whoever decides the game is over.
    winner: Option<Color>,
}

impl GameDocument {
    /// Creates an empty game waiting for players.
    #[instrument]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            players: Vec::new(),
            player_red_id: None,
            player_black_id: None,
            first_player_id: None,
            current_turn: None,
            status: GameStatus::Waiting,
            created_at: now,
            updated_at: now,
            last_move_number: 0,
            winner: None,
        }
    }

    /// Normalizes a partially populated record into the canonical shape.
    ///
    /// Missing fields take their defaults; duplicate seats and seats beyond the
    /// second are dropped.
    #[instrument(skip(partial))]
    pub fn sanitize(partial: PartialGameDocument, now: DateTime<Utc>) -> Self {
        let mut players: Vec<SeatedPlayer> = Vec::with_capacity(MAX_PLAYERS);
        for raw in partial.players.unwrap_or_default() {
            if players.iter().any(|p| p.id == raw.id) {
                warn!(player_id = %raw.id, "Dropping duplicate seat");
                continue;
            }
            if players.len() == MAX_PLAYERS {
                warn!(player_id = %raw.id, "Dropping seat beyond the second");
                continue;
            }
            players.push(SeatedPlayer {
                id: raw.id,
                ready: raw.ready.unwrap_or(false),
                joined_at: raw.joined_at.unwrap_or(now),
            });
        }

        Self {
            players,
            player_red_id: partial.player_red_id,
            player_black_id: partial.player_black_id,
            first_player_id: partial.first_player_id,
            current_turn: partial.current_turn,
            status: partial.status.unwrap_or_default(),
            created_at: partial.created_at.unwrap_or(now),
            updated_at: partial.updated_at.unwrap_or(now),
            last_move_number: partial.last_move_number.unwrap_or(0),
            winner: partial.winner,
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Seats
    // ─────────────────────────────────────────────────────────────

    /// Finds a seated player.
    pub fn find_player(&self, player_id: &str) -> Option<&SeatedPlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Whether this player holds a seat.
    pub fn is_seated(&self, player_id: &str) -> bool {
        self.find_player(player_id).is_some()
    }

    /// Whether both seats are taken.
    pub fn has_two_players(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// The first seated player other than `player_id`.
    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        self.players
            .iter()
            .map(|p| &p.id)
            .find(|id| id.as_str() != player_id)
    }

    /// Color assigned to this player, if colors are known.
    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        if self.player_red_id.as_deref() == Some(player_id) {
            Some(Color::Red)
        } else if self.player_black_id.as_deref() == Some(player_id) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Seats a player. Joining twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`ValidationError::GameFull`] when both seats are held by others.
    #[instrument(skip(self), fields(seated = self.players.len()))]
    pub fn add_player(
        &mut self,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome, ValidationError> {
        if self.is_seated(player_id) {
            debug!("Player already seated");
            return Ok(JoinOutcome::AlreadySeated);
        }
        if self.has_two_players() {
            warn!("Game already has two players");
            return Err(ValidationError::GameFull);
        }

        self.players.push(SeatedPlayer {
            id: player_id.to_string(),
            ready: false,
            joined_at: now,
        });
        self.updated_at = now;
        info!(seat = self.players.len(), "Player seated");
        Ok(JoinOutcome::Joined)
    }

    /// Frees a player's seat before the game starts.
    ///
    /// Returns false when the player held no seat.
    ///
    /// # Errors
    ///
    /// [`ValidationError::SeatsLocked`] once the first flip assigned colors.
    #[instrument(skip(self))]
    pub fn remove_player(
        &mut self,
        player_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ValidationError> {
        if !self.is_seated(player_id) {
            return Ok(false);
        }
        if self.first_player_id.is_some() {
            warn!("Seats are locked");
            return Err(ValidationError::SeatsLocked);
        }

        self.players.retain(|p| p.id != player_id);
        for slot in [
            &mut self.player_red_id,
            &mut self.player_black_id,
            &mut self.current_turn,
        ] {
            if slot.as_deref() == Some(player_id) {
                *slot = None;
            }
        }
        self.updated_at = now;
        info!("Player left");
        Ok(true)
    }

    /// Sets a seated player's ready flag. Returns false for unseated ids.
    #[instrument(skip(self))]
    pub fn set_ready(&mut self, player_id: &str, ready: bool, now: DateTime<Utc>) -> bool {
        let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) else {
            debug!("Ready toggle for unseated player ignored");
            return false;
        };
        player.ready = ready;
        self.updated_at = now;
        true
    }

    // ─────────────────────────────────────────────────────────────
    //  Colors and turns
    // ─────────────────────────────────────────────────────────────

    /// Gives `mover` the color their flip revealed and the opponent the other.
    #[instrument(skip(self))]
    pub fn assign_colors_from_first_flip(&mut self, mover: &str, color: Color) -> ColorAssignment {
        let opponent = self.opponent_of(mover).cloned();
        match color {
            Color::Red => {
                self.player_red_id = Some(mover.to_string());
                self.player_black_id = opponent;
            }
            Color::Black => {
                self.player_black_id = Some(mover.to_string());
                self.player_red_id = opponent;
            }
        }
        info!(red = ?self.player_red_id, black = ?self.player_black_id, "Colors assigned");
        ColorAssignment {
            red: self.player_red_id.clone(),
            black: self.player_black_id.clone(),
        }
    }

    /// Who moves after `player_id`.
    pub fn next_turn_for(&self, player_id: &str) -> Option<PlayerId> {
        self.opponent_of(player_id).cloned()
    }

    /// Checks that `player_id` may submit `proposed` right now.
    ///
    /// Runs before move-content validation. `prior_moves` is the last committed
    /// move number.
    ///
    /// # Errors
    ///
    /// The first failing seating or turn rule.
    #[instrument(skip(self), fields(status = %self.status, current_turn = ?self.current_turn))]
    pub fn authorize(
        &self,
        player_id: &str,
        proposed: &ProposedMove,
        prior_moves: u32,
    ) -> Result<(), ValidationError> {
        if self.status == GameStatus::Finished {
            return Err(ValidationError::GameFinished);
        }
        if !self.is_seated(player_id) {
            return Err(ValidationError::NotSeated);
        }
        if !self.has_two_players() {
            return Err(ValidationError::WaitingForOpponent);
        }
        if prior_moves == 0 && proposed.kind() != MoveKind::Flip {
            return Err(ValidationError::FirstMoveMustFlip);
        }
        if self.first_player_id.is_some() && self.current_turn.as_deref() != Some(player_id) {
            return Err(ValidationError::NotYourTurn);
        }
        Ok(())
    }

    /// Updates seating and turn state after a move was committed.
    ///
    /// The first flip of the game fixes colors permanently. Returns the
    /// assignment when this call made it.
    #[instrument(skip(self), fields(game_status = %self.status))]
    pub fn record_move(
        &mut self,
        player_id: &str,
        resolved: &ResolvedMove,
        move_number: u32,
        now: DateTime<Utc>,
    ) -> Option<ColorAssignment> {
        let mut assignment = None;
        if self.first_player_id.is_none() {
            if let ResolvedMove::Flip { piece, .. } = resolved {
                assignment = Some(self.assign_colors_from_first_flip(player_id, piece.color));
                self.first_player_id = Some(player_id.to_string());
            }
        }

        self.current_turn = self.next_turn_for(player_id);
        if self.status == GameStatus::Waiting {
            self.status = GameStatus::InProgress;
            info!("Game started");
        }
        self.last_move_number = self.last_move_number.max(move_number);
        self.updated_at = now;
        debug!(next = ?self.current_turn, "Turn passed");
        assignment
    }

    /// Brings colors, turn and move count in line with the committed log.
    ///
    /// The log is authoritative: the opening flip fixes colors and the last
    /// mover's opponent has the turn, whatever the stored record says. Seats,
    /// ready flags and `updated_at` are left alone. Returns true when a field
    /// was corrected.
    #[instrument(skip(self, moves), fields(moves = moves.len()))]
    pub fn reconcile(&mut self, moves: &[Move]) -> bool {
        let before = self.clone();
        let first = moves.iter().min_by_key(|m| *m.move_number());
        let last = moves.iter().max_by_key(|m| *m.move_number());

        match (first, last) {
            (Some(first), Some(last)) => {
                if let ResolvedMove::Flip { piece, .. } = first.action() {
                    let mover = first.player_id();
                    let opponent = moves
                        .iter()
                        .map(|m| m.player_id())
                        .find(|id| *id != mover)
                        .or_else(|| self.opponent_of(mover))
                        .cloned();
                    let (red, black) = match piece.color {
                        Color::Red => (Some(mover.clone()), opponent),
                        Color::Black => (opponent, Some(mover.clone())),
                    };
                    self.player_red_id = red;
                    self.player_black_id = black;
                    self.first_player_id = Some(mover.clone());
                } else {
                    warn!("Log does not open with a flip; colors left as stored");
                }

                let last_mover = last.player_id();
                self.current_turn = match self.color_of(last_mover) {
                    Some(Color::Red) => self.player_black_id.clone(),
                    Some(Color::Black) => self.player_red_id.clone(),
                    None => self.next_turn_for(last_mover),
                };
                self.last_move_number = *last.move_number();
                if self.status == GameStatus::Waiting {
                    self.status = GameStatus::InProgress;
                }
            }
            _ => {
                self.player_red_id = None;
                self.player_black_id = None;
                self.first_player_id = None;
                self.current_turn = None;
                self.last_move_number = 0;
                if self.status == GameStatus::InProgress {
                    self.status = GameStatus::Waiting;
                }
            }
        }

        let changed = *self != before;
        if changed {
            warn!(
                current_turn = ?self.current_turn,
                red = ?self.player_red_id,
                black = ?self.player_black_id,
                "Stored record disagreed with the move log; corrected"
            );
        }
        changed
    }

    /// Marks the game finished. Game-over detection lives outside the engine.
    #[instrument(skip(self))]
    pub fn finish(&mut self, winner: Option<Color>, now: DateTime<Utc>) {
        self.status = GameStatus::Finished;
        self.winner = winner;
        self.updated_at = now;
        info!("Game finished");
    }
}

/// A game record as it may arrive from storage, with any field missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialGameDocument {
    /// Seated players.
    pub players: Option<Vec<PartialPlayer>>,
    /// Red player.
    pub player_red_id: Option<PlayerId>,
    /// Black player.
    pub player_black_id: Option<PlayerId>,
    /// First mover.
    pub first_player_id: Option<PlayerId>,
    /// Player to move.
    pub current_turn: Option<PlayerId>,
    /// Lifecycle status.
    pub status: Option<GameStatus>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of the last committed move.
    pub last_move_number: Option<u32>,
    /// Winning color.
    pub winner: Option<Color>,
}

/// A seat entry with optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPlayer {
    /// Player id.
    pub id: PlayerId,
    /// Ready flag.
    #[serde(default)]
    pub ready: Option<bool>,
    /// When the seat was taken.
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}
