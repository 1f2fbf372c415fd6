use axum::{
    extract::Extension,
    headers::Cookie,
    routing::{get, post},
    Router,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use simplelog::*;
use sqlx::mysql::MySqlPool;
use std::{env, net::SocketAddr};

mod controllers;
mod errors;
mod models;
mod timer;

use crate::errors::CustomError;

// The claims struct carried by the token cookie
#[derive(Deserialize, Serialize, Debug)]
struct Claims {
    sub: String,
    iat: usize,
    exp: usize,
}

// Shared state: token settings plus the per-game countdown registry
#[derive(Clone)]
pub struct AppState {
    pub jwt_secret: String,
    pub token_duration: i64,
    pub timers: timer::TimerRegistry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // set up the logging facility
    let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
    info!("Starting..");

    // get database url
    let database_url = env::var("DATABASE_URL").expect("$DATABASE_URL is not set");
    debug!("database_url: {:?}", database_url);

    let pool = MySqlPool::connect(&database_url).await?;

    // Retrieve the JWT secret and token duration from the env vars and store them in the shared AppState
    let state = AppState {
        jwt_secret: env::var("JWT_SECRET").expect("$JWT_SECRET is not set"),
        token_duration: env::var("TOKEN_DURATION").expect("$TOKEN_DURATION is not set")
            .parse::<i64>().expect("$TOKEN_DURATION is not numeric"),
        timers: timer::TimerRegistry::new(),
    };

    // Define routes
    let app = Router::new()
        .route("/register", post(controllers::user::register))
        .route("/login", post(controllers::user::login))
        .route("/logout", post(controllers::user::logout))
        .route("/me", get(controllers::user::me))
        .route("/scores", get(controllers::user::high_scores))
        .route("/games", post(controllers::game::new_game).get(controllers::game::list_games))
        .route("/games/:game_id", get(controllers::game::get_game))
        .route("/games/:game_id/join", post(controllers::game::join_game))
        .route("/games/:game_id/place", post(controllers::game::place_ships))
        .route("/games/:game_id/fire", post(controllers::game::fire))
        .route("/games/:game_id/skip", post(controllers::game::skip_turn))
        .route("/games/:game_id/start", post(controllers::game::start_timer))
        .with_state(state)
        .layer(Extension(pool));

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    debug!("Listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

// Helper function to check if the token cookie is present and valid (user is logged in).
// The JWT secret is retrieved from the state shared across all handlers.
// It's here because basically every controller function needs it.
fn check_access(state: &AppState, cookie: &Cookie) -> Result<String, CustomError> {
    let token = match cookie.get("token") {
        Some(token) => token,
        None => {
            error!("No token cookie on request");
            return Err(CustomError::Unauthenticated);
        }
    };

    // Decode the token from the cookie. When succesfull return the decoded user_name (sub field)
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(token_data) => Ok(token_data.claims.sub),
        Err(err) => {
            error!("Invalid token: {:?}", err.kind());
            Err(CustomError::InvalidToken)
        }
    }
}
