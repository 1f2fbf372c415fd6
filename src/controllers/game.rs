use axum::{
    Extension, Json, response::IntoResponse,
    extract::{Path, TypedHeader, State},
    headers::Cookie,
    http::StatusCode,
};
//use axum_macros::debug_handler;
use log::{error, info};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use sqlx::MySqlPool;

use crate::errors::CustomError;
use crate::models::game::*;
use crate::models::grid::Grid;

use crate::check_access;
use crate::AppState;

// The struct used for a new game
#[derive(Deserialize, Serialize, Debug)]
pub struct NewGame {
    #[serde(default)]
    pub mode: GameMode,
}

// The struct used for submitting a placement grid
#[derive(Deserialize, Serialize, Debug)]
pub struct PlaceShips {
    pub grid: Grid,
}

// The struct used for an attack
#[derive(Deserialize, Serialize, Debug)]
pub struct FireAt {
    pub row: usize,
    pub col: usize,
}

// Fetch one game document by id
async fn load_game(pool: &MySqlPool, game_id: u32) -> Result<GameRow, CustomError> {
    let sql = "SELECT * FROM game WHERE id = ?";
    match sqlx::query_as(sql).bind(game_id).fetch_one(pool).await {
        Ok(row) => Ok(row),
        Err(sqlx::Error::RowNotFound) => Err(CustomError::GameNotFound),
        Err(err) => {
            error!("Error loading game {}: {:?}", game_id, err);
            Err(CustomError::InternalServerError)
        }
    }
}

// Write back a modified game document. The version check makes this a
// compare-and-set: a concurrent writer bumped the version first and this
// save affects no rows, so the caller reports a conflict instead of
// overwriting the other transition.
async fn save_game(
    pool: &MySqlPool,
    game_id: u32,
    version: u32,
    doc: &GameDoc,
) -> Result<(), CustomError> {
    let sql = "UPDATE game SET doc = ?, version = version + 1 WHERE id = ? AND version = ?";
    match sqlx::query(sql)
        .bind(SqlJson(doc))
        .bind(game_id)
        .bind(version)
        .execute(pool)
        .await
    {
        Ok(result) if result.rows_affected() == 1 => Ok(()),
        Ok(_) => {
            info!("Stale save rejected for game {}", game_id);
            Err(CustomError::StaleGame)
        }
        Err(err) => {
            error!("Error saving game {}: {:?}", game_id, err);
            Err(CustomError::InternalServerError)
        }
    }
}

// Insert ids come back from the driver as u64 but the id column is u32
fn insert_id(id: u64) -> Result<u32, CustomError> {
    u32::try_from(id).map_err(|_| {
        error!("Game id {} does not fit the id column", id);
        CustomError::InternalServerError
    })
}

// The updated row as the response body, with the version the save produced
fn updated(row: GameRow, doc: GameDoc) -> Json<GameRow> {
    Json(GameRow {
        id: row.id,
        doc: SqlJson(doc),
        version: row.version + 1,
        created: row.created,
    })
}

//handler for creating a new game. Solo games come up active with the
//computer as second player; multiplayer games wait open for an opponent.
pub async fn new_game(  State(state): State<AppState>,
                        Extension(pool): Extension<MySqlPool>,
                        TypedHeader(cookie): TypedHeader<Cookie>,
                        Json(newgame): Json<NewGame>
                        ) -> Result<impl IntoResponse, CustomError> {

    info!("new game request");

    //check if user is logged in, bail out if not. Retrieve the user_name from the token cookie
    let user_name = check_access(&state, &cookie)?;

    let doc = match newgame.mode {
        GameMode::Multiplayer => GameDoc::new(&user_name),
        GameMode::Solo => {
            let mut rng = rand::thread_rng();
            GameDoc::new_solo(&user_name, &mut rng)
        }
    };

    let sql = "INSERT INTO game (doc, version) VALUES (?, 0)";
    let game_id = match sqlx::query(sql)
        .bind(SqlJson(&doc))
        .execute(&pool)
        .await {
            Ok(result) => insert_id(result.last_insert_id())?,
            Err(err) => {
                error!("Error creating game: {:?}", err);
                return Err(CustomError::InternalServerError);
            }};

    info!("Game {} created by {}", game_id, user_name);
    let row = load_game(&pool, game_id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

//handler for joining an existing open game
pub async fn join_game( Path(game_id): Path<u32>,
                        State(state): State<AppState>,
                        Extension(pool): Extension<MySqlPool>,
                        TypedHeader(cookie): TypedHeader<Cookie>
                        ) -> Result<impl IntoResponse, CustomError> {

    info!("join game request for game {}", game_id);

    let user_name = check_access(&state, &cookie)?;

    let row = load_game(&pool, game_id).await?;
    let mut doc = row.doc.0.clone();
    doc.join(&user_name)?;

    save_game(&pool, game_id, row.version, &doc).await?;
    info!("User {} joined game {}", user_name, game_id);
    Ok((StatusCode::OK, updated(row, doc)))
}

//handler for storing a player's placement grid
pub async fn place_ships(   Path(game_id): Path<u32>,
                            State(state): State<AppState>,
                            Extension(pool): Extension<MySqlPool>,
                            TypedHeader(cookie): TypedHeader<Cookie>,
                            Json(placement): Json<PlaceShips>
                            ) -> Result<impl IntoResponse, CustomError> {

    info!("place ships request for game {}", game_id);

    //the placing player is always the one from the token, never from the body
    let user_name = check_access(&state, &cookie)?;

    let row = load_game(&pool, game_id).await?;
    let mut doc = row.doc.0.clone();
    doc.place_ships(&user_name, placement.grid)?;

    save_game(&pool, game_id, row.version, &doc).await?;
    Ok((StatusCode::OK, updated(row, doc)))
}

//handler for fetching a single game
pub async fn get_game(  Path(game_id): Path<u32>,
                        Extension(pool): Extension<MySqlPool>
                        ) -> Result<impl IntoResponse, CustomError> {

    let row = load_game(&pool, game_id).await?;
    Ok((StatusCode::OK, Json(row)))
}

//handler for listing all games, newest first
pub async fn list_games(Extension(pool): Extension<MySqlPool>
                        ) -> Result<impl IntoResponse, CustomError> {

    let sql = "SELECT * FROM game ORDER BY created DESC";
    let games: Vec<GameRow> = match sqlx::query_as(sql).fetch_all(&pool).await {
        Ok(games) => games,
        Err(err) => {
            error!("Error fetching games: {:?}", err);
            return Err(CustomError::InternalServerError);
        }
    };
    Ok((StatusCode::OK, Json(games)))
}

//handler for an attack. The attacker comes from the token and must be the
//player on turn; the shot resolves against the opponent's grid. In solo
//games the computer answers in the same request.
pub async fn fire(  Path(game_id): Path<u32>,
                    State(state): State<AppState>,
                    Extension(pool): Extension<MySqlPool>,
                    TypedHeader(cookie): TypedHeader<Cookie>,
                    Json(attack): Json<FireAt>
                    ) -> Result<impl IntoResponse, CustomError> {

    info!("fire request for game {}: ({}, {})", game_id, attack.row, attack.col);

    let user_name = check_access(&state, &cookie)?;

    let row = load_game(&pool, game_id).await?;
    let mut doc = row.doc.0.clone();
    doc.fire(&user_name, attack.row, attack.col)?;

    if doc.mode == GameMode::Solo
        && doc.status == GameStatus::Active
        && doc.current_turn == AI_PLAYER
    {
        let mut rng = rand::thread_rng();
        doc.ai_turn(&mut rng)?;
    }

    if let Some(winner) = doc.winner.clone() {
        // Completion: save the document and both win/loss counters in one
        // transaction. The version check keeps this to a single racing
        // fire request, so the counters move exactly once per game. The
        // computer has no user row and its update touches nothing.
        let loser = doc
            .players
            .iter()
            .find(|p| **p != winner)
            .cloned()
            .ok_or(CustomError::InternalServerError)?;

        let mut tx = match pool.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                error!("Error starting transaction for game {}: {:?}", game_id, err);
                return Err(CustomError::InternalServerError);
            }
        };

        let sql = "UPDATE game SET doc = ?, version = version + 1 WHERE id = ? AND version = ?";
        let result = match sqlx::query(sql)
            .bind(SqlJson(&doc))
            .bind(game_id)
            .bind(row.version)
            .execute(&mut tx)
            .await {
                Ok(result) => result,
                Err(err) => {
                    error!("Error saving game {}: {:?}", game_id, err);
                    return Err(CustomError::InternalServerError);
                }};
        if result.rows_affected() != 1 {
            info!("Stale save rejected for game {}", game_id);
            return Err(CustomError::StaleGame);
        }

        let sql = "UPDATE user SET wins = wins + 1 WHERE name = ?";
        if let Err(err) = sqlx::query(sql).bind(&winner).execute(&mut tx).await {
            error!("Error recording win for {}: {:?}", winner, err);
            return Err(CustomError::InternalServerError);
        }
        let sql = "UPDATE user SET losses = losses + 1 WHERE name = ?";
        if let Err(err) = sqlx::query(sql).bind(&loser).execute(&mut tx).await {
            error!("Error recording loss for {}: {:?}", loser, err);
            return Err(CustomError::InternalServerError);
        }

        if let Err(err) = tx.commit().await {
            error!("Error committing result of game {}: {:?}", game_id, err);
            return Err(CustomError::InternalServerError);
        }

        info!("Game {} won by {}", game_id, winner);
        state.timers.cancel(game_id).await;
    } else {
        save_game(&pool, game_id, row.version, &doc).await?;
    }

    Ok((StatusCode::OK, updated(row, doc)))
}

//handler for skipping the current turn, used when the turn timer elapses
pub async fn skip_turn( Path(game_id): Path<u32>,
                        Extension(pool): Extension<MySqlPool>
                        ) -> Result<impl IntoResponse, CustomError> {

    info!("skip request for game {}", game_id);

    let row = load_game(&pool, game_id).await?;
    let mut doc = row.doc.0.clone();
    doc.skip()?;

    save_game(&pool, game_id, row.version, &doc).await?;
    Ok((StatusCode::OK, updated(row, doc)))
}

//handler for starting the turn countdown of an active game. Idempotent:
//a second request while a timer runs does not start another one.
pub async fn start_timer(   Path(game_id): Path<u32>,
                            State(state): State<AppState>,
                            Extension(pool): Extension<MySqlPool>
                            ) -> Result<impl IntoResponse, CustomError> {

    info!("start timer request for game {}", game_id);

    let row = load_game(&pool, game_id).await?;
    let mut doc = row.doc.0.clone();
    if doc.status != GameStatus::Active {
        return Err(CustomError::GameNotActive);
    }

    if doc.time_left.is_none() {
        doc.time_left = Some(TURN_SECONDS);
        save_game(&pool, game_id, row.version, &doc).await?;
    }

    if state.timers.start(pool.clone(), game_id).await {
        Ok((StatusCode::OK, "Turn timer started"))
    } else {
        Ok((StatusCode::OK, "Turn timer already running"))
    }
}
