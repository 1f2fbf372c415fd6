use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::models::grid::{Grid, GridError, Shot};

// Reserved opponent name for solo games. Registration refuses it.
pub const AI_PLAYER: &str = "computer";

// Seconds a player gets per turn once the countdown is running
pub const TURN_SECONDS: u32 = 60;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Open,
    Active,
    Completed,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Multiplayer,
    Solo,
}

// Append-only history entry: an attack or a skipped turn
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MoveRecord {
    Attack {
        username: String,
        row: usize,
        col: usize,
    },
    Skip {
        username: String,
        timestamp: DateTime<Local>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameError {
    GameNotOpen,
    GameNotActive,
    GameCompleted,
    GameFull,
    SelfPlay,
    NotAPlayer,
    NotYourTurn,
    PlacementLocked,
    Grid(GridError),
}

impl From<GridError> for GameError {
    fn from(err: GridError) -> Self {
        GameError::Grid(err)
    }
}

// What a resolved shot did, so the caller can update user records
#[derive(Clone, Debug, PartialEq)]
pub struct FireOutcome {
    pub shot: Shot,
    pub defender: String,
    pub winner: Option<String>,
}

/// The persisted game document. All state transitions go through the
/// methods below; the HTTP layer only loads, calls and saves.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameDoc {
    pub players: Vec<String>,
    pub status: GameStatus,
    #[serde(default)]
    pub mode: GameMode,
    pub current_turn: String,
    pub player1_grid: Grid,
    pub player2_grid: Grid,
    pub history: Vec<MoveRecord>,
    pub winner: Option<String>,
    pub time_left: Option<u32>,
}

impl GameDoc {
    /// A fresh open game waiting for an opponent.
    pub fn new(creator: &str) -> Self {
        GameDoc {
            players: vec![creator.to_string()],
            status: GameStatus::Open,
            mode: GameMode::Multiplayer,
            current_turn: creator.to_string(),
            player1_grid: Grid::new(),
            player2_grid: Grid::new(),
            history: Vec::new(),
            winner: None,
            // the countdown endpoint sets this when a timer starts
            time_left: None,
        }
    }

    /// A solo game against the computer, active immediately. The computer
    /// gets a random fleet; the creator still has to place theirs.
    pub fn new_solo<R: Rng + ?Sized>(creator: &str, rng: &mut R) -> Self {
        GameDoc {
            players: vec![creator.to_string(), AI_PLAYER.to_string()],
            status: GameStatus::Active,
            mode: GameMode::Solo,
            current_turn: creator.to_string(),
            player1_grid: Grid::new(),
            player2_grid: Grid::random_fleet(rng),
            history: Vec::new(),
            winner: None,
            time_left: None,
        }
    }

    fn player_index(&self, username: &str) -> Option<usize> {
        self.players.iter().position(|p| p == username)
    }

    /// The player who is not on turn.
    pub fn opponent(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|p| **p != self.current_turn)
            .map(String::as_str)
    }

    fn require_active(&self) -> Result<(), GameError> {
        match self.status {
            GameStatus::Active => Ok(()),
            GameStatus::Open => Err(GameError::GameNotActive),
            GameStatus::Completed => Err(GameError::GameCompleted),
        }
    }

    /// Second player joins an open game. The creator keeps the first turn.
    pub fn join(&mut self, joiner: &str) -> Result<(), GameError> {
        if self.status != GameStatus::Open {
            return Err(GameError::GameNotOpen);
        }
        if self.players.len() != 1 {
            return Err(GameError::GameFull);
        }
        if self.players[0] == joiner {
            return Err(GameError::SelfPlay);
        }
        self.players.push(joiner.to_string());
        self.status = GameStatus::Active;
        Ok(())
    }

    /// Store a player's placement grid. Legal while open or active, but
    /// refused once the slot has taken any shot.
    pub fn place_ships(&mut self, username: &str, grid: Grid) -> Result<(), GameError> {
        if self.status == GameStatus::Completed {
            return Err(GameError::GameCompleted);
        }
        let index = self.player_index(username).ok_or(GameError::NotAPlayer)?;
        grid.validate_fleet()?;
        let slot = if index == 0 {
            &mut self.player1_grid
        } else {
            &mut self.player2_grid
        };
        if slot.under_attack() {
            return Err(GameError::PlacementLocked);
        }
        *slot = grid;
        Ok(())
    }

    /// Resolve one attack by the player on turn against the opponent's
    /// grid. On a win the game completes and the winner is recorded; a
    /// completed game rejects any further shot, so the completion side
    /// effects can only happen once.
    pub fn fire(&mut self, attacker: &str, row: usize, col: usize) -> Result<FireOutcome, GameError> {
        self.require_active()?;
        if attacker != self.current_turn {
            return Err(GameError::NotYourTurn);
        }
        let defender = self
            .opponent()
            .ok_or(GameError::GameNotActive)?
            .to_string();
        let target = if self.players[0] == self.current_turn {
            &mut self.player2_grid
        } else {
            &mut self.player1_grid
        };
        let shot = target.fire(row, col)?;
        self.history.push(MoveRecord::Attack {
            username: attacker.to_string(),
            row,
            col,
        });
        if shot.all_sunk {
            self.status = GameStatus::Completed;
            self.winner = Some(attacker.to_string());
            self.time_left = None;
        } else {
            self.current_turn = defender.clone();
        }
        Ok(FireOutcome {
            shot,
            defender,
            winner: self.winner.clone(),
        })
    }

    /// Skip the current player's turn, recording it in the history. The
    /// countdown restarts for the next player.
    pub fn skip(&mut self) -> Result<(), GameError> {
        self.require_active()?;
        let next = self
            .opponent()
            .ok_or(GameError::GameNotActive)?
            .to_string();
        self.history.push(MoveRecord::Skip {
            username: self.current_turn.clone(),
            timestamp: Local::now(),
        });
        self.current_turn = next;
        if self.time_left.is_some() {
            self.time_left = Some(TURN_SECONDS);
        }
        Ok(())
    }

    /// One second of the turn countdown. Expiry auto-skips the turn and
    /// restarts the countdown; it never force-completes the game. Returns
    /// true when the turn was skipped.
    pub fn tick(&mut self) -> Result<bool, GameError> {
        self.require_active()?;
        let left = self.time_left.unwrap_or(TURN_SECONDS);
        if left > 1 {
            self.time_left = Some(left - 1);
            Ok(false)
        } else {
            self.time_left = Some(TURN_SECONDS);
            self.skip()?;
            Ok(true)
        }
    }

    /// The computer's move in a solo game: a uniformly random cell among
    /// those not yet targeted on the human's grid.
    pub fn ai_turn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<FireOutcome, GameError> {
        self.require_active()?;
        if self.current_turn != AI_PLAYER {
            return Err(GameError::NotYourTurn);
        }
        let target = if self.players[0] == AI_PLAYER {
            &self.player2_grid
        } else {
            &self.player1_grid
        };
        let (row, col) = target
            .random_untargeted(rng)
            .ok_or(GameError::GameCompleted)?;
        self.fire(AI_PLAYER, row, col)
    }
}

// Storage row: the document as one JSON column plus a version counter for
// optimistic concurrency. Stale saves affect zero rows and are rejected.
#[derive(Serialize, sqlx::FromRow, Debug)]
pub struct GameRow {
    pub id: u32,
    #[serde(flatten)]
    pub doc: Json<GameDoc>,
    pub version: u32,
    pub created: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::grid::{Cell, Orientation, FLEET, GRID_SIZE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fleet_grid() -> Grid {
        let mut grid = Grid::new();
        for (i, &length) in FLEET.iter().enumerate() {
            grid.place(i * 2, 0, length, Orientation::Horizontal).unwrap();
        }
        grid
    }

    fn ship_cells(grid: &Grid) -> Vec<(usize, usize)> {
        (0..GRID_SIZE)
            .flat_map(|r| (0..GRID_SIZE).map(move |c| (r, c)))
            .filter(|&(r, c)| grid.cell(r, c) == Cell::Ship)
            .collect()
    }

    fn active_game() -> GameDoc {
        let mut game = GameDoc::new("alice");
        game.join("bob").unwrap();
        game.place_ships("alice", fleet_grid()).unwrap();
        game.place_ships("bob", fleet_grid()).unwrap();
        game
    }

    #[test]
    fn create_starts_open_with_creator_on_turn() {
        let game = GameDoc::new("alice");
        assert_eq!(game.status, GameStatus::Open);
        assert_eq!(game.players, vec!["alice"]);
        assert_eq!(game.current_turn, "alice");
        assert!(game.history.is_empty());
        assert_eq!(game.winner, None);
        // no countdown until a timer is explicitly started
        assert_eq!(game.time_left, None);
    }

    #[test]
    fn join_activates_without_changing_turn() {
        let mut game = GameDoc::new("alice");
        game.join("bob").unwrap();
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.players, vec!["alice", "bob"]);
        assert_eq!(game.current_turn, "alice");
    }

    #[test]
    fn join_rejects_self_play() {
        let mut game = GameDoc::new("alice");
        assert_eq!(game.join("alice"), Err(GameError::SelfPlay));
        assert_eq!(game.status, GameStatus::Open);
    }

    #[test]
    fn join_rejects_a_full_game() {
        let mut game = GameDoc::new("alice");
        game.join("bob").unwrap();
        assert_eq!(game.join("carol"), Err(GameError::GameNotOpen));
    }

    #[test]
    fn place_ships_requires_membership_and_a_legal_fleet() {
        let mut game = GameDoc::new("alice");
        assert_eq!(
            game.place_ships("mallory", fleet_grid()),
            Err(GameError::NotAPlayer)
        );
        assert_eq!(
            game.place_ships("alice", Grid::new()),
            Err(GameError::Grid(GridError::BadFleet))
        );
        game.place_ships("alice", fleet_grid()).unwrap();
        assert_eq!(game.player1_grid, fleet_grid());
        // placement alone never changes the status
        assert_eq!(game.status, GameStatus::Open);
    }

    #[test]
    fn place_ships_locks_once_the_slot_is_under_attack() {
        let mut game = active_game();
        game.fire("alice", 9, 9).unwrap();
        assert_eq!(
            game.place_ships("bob", fleet_grid()),
            Err(GameError::PlacementLocked)
        );
        // alice's grid is untouched, she may still re-place
        game.place_ships("alice", fleet_grid()).unwrap();
    }

    #[test]
    fn fire_enforces_status_and_turn() {
        let mut open = GameDoc::new("alice");
        assert_eq!(open.fire("alice", 0, 0), Err(GameError::GameNotActive));

        let mut game = active_game();
        assert_eq!(game.fire("bob", 0, 0), Err(GameError::NotYourTurn));
        game.fire("alice", 9, 9).unwrap();
        assert_eq!(game.current_turn, "bob");
        assert_eq!(game.fire("alice", 9, 8), Err(GameError::NotYourTurn));
    }

    #[test]
    fn fire_rejects_repeated_targets() {
        let mut game = active_game();
        game.fire("alice", 9, 9).unwrap();
        game.fire("bob", 9, 9).unwrap();
        assert_eq!(
            game.fire("alice", 9, 9),
            Err(GameError::Grid(GridError::AlreadyTargeted))
        );
        // the failed shot neither switched the turn nor logged a move
        assert_eq!(game.current_turn, "alice");
        assert_eq!(game.history.len(), 2);
    }

    #[test]
    fn skip_flips_the_turn_and_logs_it() {
        let mut game = active_game();
        game.skip().unwrap();
        assert_eq!(game.current_turn, "bob");
        assert!(matches!(
            game.history.last(),
            Some(MoveRecord::Skip { username, .. }) if username == "alice"
        ));
        game.skip().unwrap();
        assert_eq!(game.current_turn, "alice");
    }

    #[test]
    fn countdown_expiry_skips_instead_of_completing() {
        let mut game = active_game();
        game.time_left = Some(2);
        assert_eq!(game.tick(), Ok(false));
        assert_eq!(game.time_left, Some(1));
        assert_eq!(game.tick(), Ok(true));
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.current_turn, "bob");
        assert_eq!(game.time_left, Some(TURN_SECONDS));
    }

    #[test]
    fn sinking_the_fleet_completes_the_game_once() {
        let mut game = active_game();
        let targets = ship_cells(&fleet_grid());
        // alice hits one ship cell per turn; bob burns his turns on the
        // empty odd rows of alice's grid
        for (i, &(row, col)) in targets.iter().enumerate() {
            let outcome = game.fire("alice", row, col).unwrap();
            assert_eq!(outcome.shot.cell, Cell::Hit);
            assert_eq!(outcome.defender, "bob");
            if i + 1 < targets.len() {
                assert_eq!(outcome.winner, None);
                assert_eq!(game.current_turn, "bob");
                let miss = game.fire("bob", 1 + 2 * (i / 10), i % 10).unwrap();
                assert_eq!(miss.shot.cell, Cell::Miss);
                assert_eq!(game.current_turn, "alice");
            } else {
                assert_eq!(outcome.winner.as_deref(), Some("alice"));
            }
        }
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.winner.as_deref(), Some("alice"));
        assert_eq!(game.current_turn, "alice");
        // terminal state rejects everything that could complete it again
        assert_eq!(game.fire("bob", 9, 9), Err(GameError::GameCompleted));
        assert_eq!(game.skip(), Err(GameError::GameCompleted));
        assert_eq!(game.tick(), Err(GameError::GameCompleted));
    }

    #[test]
    fn solo_game_alternates_with_the_computer() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = GameDoc::new_solo("alice", &mut rng);
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.players, vec!["alice", AI_PLAYER]);
        assert_eq!(game.player2_grid.validate_fleet(), Ok(()));
        game.place_ships("alice", fleet_grid()).unwrap();

        // the computer may not move while it is alice's turn
        assert_eq!(game.ai_turn(&mut rng), Err(GameError::NotYourTurn));

        let outcome = game.fire("alice", 0, 0).unwrap();
        if outcome.winner.is_none() {
            assert_eq!(game.current_turn, AI_PLAYER);
            let reply = game.ai_turn(&mut rng).unwrap();
            assert_eq!(reply.defender, "alice");
            assert!(matches!(reply.shot.cell, Cell::Hit | Cell::Miss));
            assert_eq!(game.current_turn, "alice");
        }
    }

    #[test]
    fn history_round_trips_as_tagged_json() {
        let mut game = active_game();
        game.fire("alice", 9, 9).unwrap();
        game.skip().unwrap();
        let json = serde_json::to_string(&game).unwrap();
        assert!(json.contains("\"kind\":\"attack\""));
        assert!(json.contains("\"kind\":\"skip\""));
        let back: GameDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back, game);
    }
}
