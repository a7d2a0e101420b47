//! End-to-end tests for game operations over the in-memory store.

use banqi_rules::{
    Color, GameDocument, GameStatus, Move, Piece, PieceKind, Position, ProposedMove,
    ResolvedMove, StatusClass, TOTAL_PIECES, ValidationError,
};
use banqi_service::{
    CommitOutcome, GameService, GameStore, MemoryStore, Revision, ServiceError, StoreError,
    TokenAuthenticator,
};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const ALICE: &str = "Bearer alice-token";
const BOB: &str = "Bearer bob-token";
const CAROL: &str = "carol-token";

fn tokens() -> TokenAuthenticator {
    TokenAuthenticator::new(HashMap::from([
        ("alice-token".to_string(), "alice".to_string()),
        ("bob-token".to_string(), "bob".to_string()),
        ("carol-token".to_string(), "carol".to_string()),
    ]))
}

fn pos(row: i64, col: i64) -> Position {
    Position::new(row, col).expect("on board")
}

fn flip(row: i64, col: i64) -> ProposedMove {
    ProposedMove::Flip {
        position: pos(row, col),
    }
}

/// Current record and the revision a writer would hold after reading it.
fn read<S: GameStore>(store: &S, game_id: &str) -> (GameDocument, Revision) {
    let game = store.load_game(game_id).expect("load").expect("exists");
    let moves = store.load_moves(game_id).expect("load");
    let revision = Revision::of(&game, &moves);
    (game, revision)
}

fn service<S: GameStore>(store: S) -> GameService<S, TokenAuthenticator> {
    GameService::new(store, tokens(), 3)
}

#[test]
fn test_two_players_open_a_game() {
    let svc = service(MemoryStore::new());
    let mut rng = StdRng::seed_from_u64(2024);

    let created = svc.create_game(ALICE).expect("create");
    let id = created.game_id().clone();
    assert_eq!(created.game().players().len(), 1);
    assert_eq!(*created.game().status(), GameStatus::Waiting);

    let joined = svc.join_game(BOB, &id).expect("join");
    assert!(joined.game().has_two_players());

    svc.set_ready(ALICE, &id, true).expect("ready");
    let ready = svc.set_ready(BOB, &id, true).expect("ready");
    assert!(ready.game().players().iter().all(|p| *p.ready()));

    let first = svc.submit_move(ALICE, &id, &flip(0, 0), &mut rng).expect("flip");
    let game = first.game();
    assert_eq!(*game.status(), GameStatus::InProgress);
    assert_eq!(game.first_player_id().as_deref(), Some("alice"));
    assert_eq!(game.current_turn().as_deref(), Some("bob"));
    let ResolvedMove::Flip { piece, .. } = *first.moves()[0].action() else {
        panic!("first move is a flip");
    };
    assert_eq!(game.color_of("alice"), Some(piece.color));
    assert_eq!(game.color_of("bob"), Some(piece.color.opponent()));

    // Alice may not move twice.
    let err = svc
        .submit_move(ALICE, &id, &flip(0, 1), &mut rng)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::NotYourTurn)
    ));
    assert_eq!(err.status(), StatusClass::Conflict);

    let second = svc.submit_move(BOB, &id, &flip(0, 1), &mut rng).expect("flip");
    assert_eq!(second.moves().len(), 2);
    assert_eq!(*second.state().last_move_number(), 2);
    assert_eq!(second.state().face_down_pieces().len(), TOTAL_PIECES - 2);
    assert_eq!(second.game().current_turn().as_deref(), Some("alice"));

    let view = svc.game_view(CAROL, &id).expect("anyone may look");
    assert_eq!(view.state(), second.state());
}

#[test]
fn test_seating_rules() {
    let svc = service(MemoryStore::new());
    let id = svc.create_game(ALICE).expect("create").game_id().clone();

    // Joining twice changes nothing.
    let again = svc.join_game(ALICE, &id).expect("idempotent join");
    assert_eq!(again.game().players().len(), 1);

    svc.join_game(BOB, &id).expect("join");
    let full = svc.join_game(CAROL, &id).unwrap_err();
    assert!(matches!(
        full,
        ServiceError::Rejected(ValidationError::GameFull)
    ));

    let not_seated = svc.set_ready(CAROL, &id, true).unwrap_err();
    assert_eq!(not_seated.status(), StatusClass::Forbidden);

    // Bob leaves before the first flip; Carol takes the seat.
    let left = svc.leave_game(BOB, &id).expect("leave");
    assert!(!left.game().is_seated("bob"));
    svc.join_game(CAROL, &id).expect("join after leave");

    svc.submit_move(CAROL, &id, &flip(1, 1), &mut StdRng::seed_from_u64(5))
        .expect("flip");
    let locked = svc.leave_game(ALICE, &id).unwrap_err();
    assert!(matches!(
        locked,
        ServiceError::Rejected(ValidationError::SeatsLocked)
    ));
}

#[test]
fn test_first_move_must_flip() {
    let svc = service(MemoryStore::new());
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");

    let err = svc
        .submit_move(
            ALICE,
            &id,
            &ProposedMove::Move {
                from: pos(0, 0),
                to: pos(0, 1),
            },
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::FirstMoveMustFlip)
    ));
    assert_eq!(err.status(), StatusClass::BadRequest);
}

#[test]
fn test_rejected_move_leaves_log_untouched() {
    let store = MemoryStore::new();
    let svc = service(store.clone());
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");
    svc.submit_move(ALICE, &id, &flip(2, 2), &mut StdRng::seed_from_u64(9))
        .expect("flip");

    let err = svc
        .submit_move(BOB, &id, &flip(2, 2), &mut StdRng::seed_from_u64(9))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::NotFaceDown(_))
    ));
    assert_eq!(store.load_moves(&id).expect("load").len(), 1);
}

#[test]
fn test_finished_game_rejects_moves() {
    let store = MemoryStore::new();
    let svc = service(store.clone());
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");

    let (mut game, revision) = read(&store, &id);
    game.finish(Some(Color::Red), Utc::now());
    store
        .commit_metadata(&id, &game, revision)
        .expect("update");

    let err = svc
        .submit_move(ALICE, &id, &flip(0, 0), &mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::GameFinished)
    ));

    // Finished games stay visible, also to players without a seat.
    let view = svc.game_view(CAROL, &id).expect("view");
    assert_eq!(*view.game().status(), GameStatus::Finished);
}

#[test]
fn test_corrupt_log_is_internal() {
    let store = MemoryStore::new();
    let svc = service(store.clone());
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    let (game, revision) = read(&store, &id);

    // A step from a square that was never revealed.
    let bogus = Move::new(
        1,
        "alice".to_string(),
        None,
        ResolvedMove::Move {
            from: pos(0, 0),
            to: pos(0, 1),
        },
    );
    assert_eq!(
        store
            .commit_move(&id, &bogus, &game, revision)
            .expect("commit"),
        CommitOutcome::Committed
    );

    let err = svc.game_view(ALICE, &id).unwrap_err();
    assert!(matches!(err, ServiceError::Corrupted(_)));
    assert_eq!(err.status(), StatusClass::Internal);
}

// ─────────────────────────────────────────────────────────────
//  Turn order against a stale record
// ─────────────────────────────────────────────────────────────

/// Store that appends moves but never updates the game record with them.
#[derive(Debug, Default)]
struct LaggingStore {
    inner: MemoryStore,
}

impl GameStore for LaggingStore {
    fn create_game(&self, game_id: &str, game: &GameDocument) -> Result<(), StoreError> {
        self.inner.create_game(game_id, game)
    }

    fn load_game(&self, game_id: &str) -> Result<Option<GameDocument>, StoreError> {
        self.inner.load_game(game_id)
    }

    fn load_moves(&self, game_id: &str) -> Result<Vec<Move>, StoreError> {
        self.inner.load_moves(game_id)
    }

    fn commit_move(
        &self,
        game_id: &str,
        mv: &Move,
        _game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        let stored = self
            .inner
            .load_game(game_id)?
            .ok_or_else(|| StoreError::new("lagging game missing"))?;
        self.inner.commit_move(game_id, mv, &stored, expected)
    }

    fn commit_metadata(
        &self,
        game_id: &str,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        self.inner.commit_metadata(game_id, game, expected)
    }
}

#[test]
fn test_turn_follows_log_when_record_lags() {
    let svc = service(LaggingStore::default());
    let mut rng = StdRng::seed_from_u64(11);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");

    let opening = svc.submit_move(ALICE, &id, &flip(0, 0), &mut rng).expect("flip");
    let (stored, _) = read(svc.store(), &id);
    assert!(stored.first_player_id().is_none());

    let again = svc
        .submit_move(ALICE, &id, &flip(0, 1), &mut rng)
        .unwrap_err();
    assert!(matches!(
        again,
        ServiceError::Rejected(ValidationError::NotYourTurn)
    ));

    svc.submit_move(BOB, &id, &flip(1, 0), &mut rng).expect("flip");
    let twice = svc
        .submit_move(BOB, &id, &flip(1, 1), &mut rng)
        .unwrap_err();
    assert!(matches!(
        twice,
        ServiceError::Rejected(ValidationError::NotYourTurn)
    ));

    let view = svc.submit_move(ALICE, &id, &flip(2, 0), &mut rng).expect("flip");
    let players: Vec<&str> = view.moves().iter().map(|m| m.player_id().as_str()).collect();
    assert_eq!(players, ["alice", "bob", "alice"]);
    assert_eq!(view.game().current_turn().as_deref(), Some("bob"));
    assert_eq!(
        view.game().color_of("alice"),
        opening.game().color_of("alice")
    );
}

#[test]
fn test_overwritten_record_cannot_undo_colors() {
    let store = MemoryStore::new();
    let svc = service(store.clone());
    let mut rng = StdRng::seed_from_u64(12);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");
    let (mut before_flip, _) = read(&store, &id);

    let opening = svc.submit_move(ALICE, &id, &flip(0, 0), &mut rng).expect("flip");
    let alice_color = opening.game().color_of("alice");
    assert!(alice_color.is_some());

    // A pre-flip copy of the record lands on top of the assignment.
    let (_, current) = read(&store, &id);
    before_flip.set_ready("bob", true, Utc::now());
    assert_eq!(
        store
            .commit_metadata(&id, &before_flip, current)
            .expect("update"),
        CommitOutcome::Committed
    );

    let err = svc
        .submit_move(ALICE, &id, &flip(0, 1), &mut rng)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::NotYourTurn)
    ));

    let view = svc.submit_move(BOB, &id, &flip(0, 1), &mut rng).expect("flip");
    assert_eq!(view.game().color_of("alice"), alice_color);
    assert_eq!(view.game().first_player_id().as_deref(), Some("alice"));
    assert_eq!(view.game().current_turn().as_deref(), Some("alice"));
}

// ─────────────────────────────────────────────────────────────
//  Commit races
// ─────────────────────────────────────────────────────────────

/// Store that lets a rival write land just before the next commit.
#[derive(Debug, Default)]
struct RacingStore {
    inner: MemoryStore,
    armed: AtomicBool,
    armed_seat: AtomicBool,
}

impl RacingStore {
    fn rival_flip(&self, game_id: &str) -> Result<(), StoreError> {
        let (mut game, revision) = read(&self.inner, game_id);
        let now = Utc::now();
        let resolved = ResolvedMove::Flip {
            position: pos(3, 7),
            piece: Piece::new(PieceKind::Pawn, Color::Black),
        };
        game.record_move("alice", &resolved, 1, now);
        let rival = Move::new(1, "alice".to_string(), Some(now), resolved);
        assert_eq!(
            self.inner.commit_move(game_id, &rival, &game, revision)?,
            CommitOutcome::Committed
        );
        Ok(())
    }

    fn rival_ready(&self, game_id: &str) -> Result<(), StoreError> {
        let (mut game, revision) = read(&self.inner, game_id);
        assert!(game.set_ready("alice", true, Utc::now()));
        assert_eq!(
            self.inner.commit_metadata(game_id, &game, revision)?,
            CommitOutcome::Committed
        );
        Ok(())
    }
}

impl GameStore for RacingStore {
    fn create_game(&self, game_id: &str, game: &GameDocument) -> Result<(), StoreError> {
        self.inner.create_game(game_id, game)
    }

    fn load_game(&self, game_id: &str) -> Result<Option<GameDocument>, StoreError> {
        self.inner.load_game(game_id)
    }

    fn load_moves(&self, game_id: &str) -> Result<Vec<Move>, StoreError> {
        self.inner.load_moves(game_id)
    }

    fn commit_move(
        &self,
        game_id: &str,
        mv: &Move,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.rival_flip(game_id)?;
        }
        self.inner.commit_move(game_id, mv, game, expected)
    }

    fn commit_metadata(
        &self,
        game_id: &str,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        if self.armed_seat.swap(false, Ordering::SeqCst) {
            self.rival_ready(game_id)?;
        }
        self.inner.commit_metadata(game_id, game, expected)
    }
}

#[test]
fn test_lost_race_is_retried_against_fresh_log() {
    let store = RacingStore::default();
    let svc = service(store);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");
    svc.store().armed.store(true, Ordering::SeqCst);

    // Bob opens, but Alice's flip lands first. On retry it is Bob's turn.
    let view = svc
        .submit_move(BOB, &id, &flip(0, 0), &mut StdRng::seed_from_u64(3))
        .expect("retry succeeds");

    assert_eq!(view.moves().len(), 2);
    assert_eq!(view.moves()[0].player_id(), "alice");
    assert_eq!(view.moves()[1].player_id(), "bob");
    assert_eq!(*view.moves()[1].move_number(), 2);
    assert_eq!(view.game().first_player_id().as_deref(), Some("alice"));
    assert_eq!(view.game().player_black_id().as_deref(), Some("alice"));
    assert_eq!(view.game().current_turn().as_deref(), Some("alice"));
}

#[test]
fn test_retry_revalidates_the_move() {
    let store = RacingStore::default();
    let svc = service(store);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");
    svc.store().armed.store(true, Ordering::SeqCst);

    // Alice double-submits: the rival copy wins and the retry is out of turn.
    let err = svc
        .submit_move(ALICE, &id, &flip(0, 0), &mut StdRng::seed_from_u64(3))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::NotYourTurn)
    ));
    assert_eq!(svc.store().load_moves(&id).expect("load").len(), 1);
}

#[test]
fn test_seat_write_retries_without_losing_updates() {
    let store = RacingStore::default();
    let svc = service(store);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");
    svc.store().armed_seat.store(true, Ordering::SeqCst);

    // Alice's ready toggle lands between Bob's read and write.
    let view = svc.set_ready(BOB, &id, true).expect("retry succeeds");
    assert!(view.game().players().iter().all(|p| *p.ready()));

    let (stored, _) = read(svc.store(), &id);
    assert_eq!(&stored, view.game());
}

#[test]
fn test_seat_write_after_first_flip_sees_locked_seats() {
    let store = RacingStore::default();
    let svc = service(store);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");

    // Bob read the record before Alice's opening flip committed.
    let (mut left, revision) = read(svc.store(), &id);
    svc.submit_move(ALICE, &id, &flip(0, 0), &mut StdRng::seed_from_u64(4))
        .expect("flip");
    left.remove_player("bob", Utc::now()).expect("not yet locked");
    assert!(matches!(
        svc.store().commit_metadata(&id, &left, revision),
        Ok(CommitOutcome::Conflict { latest: 1 })
    ));

    // Going through the service the leave is re-read and refused.
    let err = svc.leave_game(BOB, &id).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ValidationError::SeatsLocked)
    ));
}

/// Store whose move commits always lose.
#[derive(Debug, Default)]
struct AlwaysBehind {
    inner: MemoryStore,
    attempts: AtomicU32,
}

impl GameStore for AlwaysBehind {
    fn create_game(&self, game_id: &str, game: &GameDocument) -> Result<(), StoreError> {
        self.inner.create_game(game_id, game)
    }

    fn load_game(&self, game_id: &str) -> Result<Option<GameDocument>, StoreError> {
        self.inner.load_game(game_id)
    }

    fn load_moves(&self, game_id: &str) -> Result<Vec<Move>, StoreError> {
        self.inner.load_moves(game_id)
    }

    fn commit_move(
        &self,
        _game_id: &str,
        _mv: &Move,
        _game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(CommitOutcome::Conflict {
            latest: expected.last_move_number + 1,
        })
    }

    fn commit_metadata(
        &self,
        game_id: &str,
        game: &GameDocument,
        expected: Revision,
    ) -> Result<CommitOutcome, StoreError> {
        self.inner.commit_metadata(game_id, game, expected)
    }
}

#[test]
fn test_conflict_after_max_attempts() {
    let store = AlwaysBehind::default();
    let svc = service(store);
    let id = svc.create_game(ALICE).expect("create").game_id().clone();
    svc.join_game(BOB, &id).expect("join");

    let err = svc
        .submit_move(ALICE, &id, &flip(0, 0), &mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { attempts: 3 }));
    assert_eq!(err.status(), StatusClass::Conflict);
    assert_eq!(svc.store().attempts.load(Ordering::SeqCst), 3);
}
