use axum::{
    Extension, Json, response::IntoResponse,
    extract::{TypedHeader, State},
    headers::Cookie,
    http::{StatusCode, header::SET_COOKIE},
};
//use axum_macros::debug_handler;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use log::{debug, error, info};
use pwhash::bcrypt;
use serde_json::json;
use sqlx::MySqlPool;

use crate::errors::CustomError;
use crate::models::game::AI_PLAYER;
use crate::models::user::*;

use crate::check_access;
use crate::AppState;
use crate::Claims;

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Build the Set-Cookie value carrying a fresh token for the user. The
// cookie is HTTP-only so scripts never see the token.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn token_cookie(state: &AppState, user_name: &str) -> Result<String, CustomError> {

    // Define the registered <Expiration Time> claim (exp) which is the current timestamp plus the defined offset
    let now = Utc::now();
    let my_exp = match now.checked_add_signed(Duration::seconds(state.token_duration)) {
        Some(exp) => exp.timestamp(),
        None => {
            error!("Token duration overflows the expiration timestamp");
            return Err(CustomError::InternalServerError);
        }
    };

    let my_claims = Claims {
        sub: user_name.to_string(),             // username
        iat: now.timestamp() as usize,          // valid from
        exp: my_exp as usize,                   // valid until
    };

    match encode(
        &Header::default(),
        &my_claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    ) {
        Ok(token) => {
            debug!("Generated token for {}", user_name);
            Ok(format!(
                "token={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
                token, state.token_duration
            ))
        }
        Err(err) => {
            error!("Unexpected error while encoding the token ({:?})", err);
            Err(CustomError::InternalServerError)
        }
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for registering a new account. Username and password rules are
// enforced here; the reserved computer opponent name is refused. A
// successful registration logs the user in right away.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn register(  State(state): State<AppState>,
                        Extension(pool): Extension<MySqlPool>,
                        Json(register): Json<Register>,
                        ) -> Result<impl IntoResponse, CustomError> {

    info!("register request for user: {}", register.username);

    if !valid_username(&register.username) || register.username == AI_PLAYER {
        return Err(CustomError::InvalidUsername);
    }
    if register.password.len() < 6 || register.password != register.confirm_password {
        return Err(CustomError::InvalidPassword);
    }

    // check if the user already exists, bail out if that is the case
    let sql = "SELECT * FROM user WHERE name = ?";
    if sqlx::query_as::<_, User>(sql)
        .bind(&register.username)
        .fetch_one(&pool)
        .await.is_ok() {
            error!("Trying to register a username that already exists");
            return Err(CustomError::UserExists);
    }

    // Create the password hash
    let password_hash = match bcrypt::hash(&register.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Unexpected error encrypting password {:?}", err);
            return Err(CustomError::InternalServerError);
        }
    };

    // Create user
    let sql = "INSERT INTO user (name, password_hash, wins, losses) VALUES (?, ?, 0, 0)";
    if let Err(err) = sqlx::query(sql)
        .bind(&register.username)
        .bind(password_hash)
        .execute(&pool)
        .await {
            error!("Error creating user: {:?}", err);
            return Err(CustomError::InternalServerError);
    }

    let cookie = token_cookie(&state, &register.username)?;
    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(json!({ "username": register.username })),
    ))
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for logging in. The password is checked against the stored
// bcrypt hash; on success the token cookie is set.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn login( State(state): State<AppState>,
                    Extension(pool): Extension<MySqlPool>,
                    Json(credentials): Json<Credentials>,
                    ) -> Result<impl IntoResponse, CustomError> {

    info!("login request by user: {}", credentials.username);

    // Fetch the user using the username from the credentials
    let sql = "SELECT * FROM user WHERE name = ?";
    let user: User = sqlx::query_as(sql)
        .bind(&credentials.username)
        .fetch_one(&pool)
        .await
        .map_err(|err| {
            error!("error retrieving user: {:?}", err);
            CustomError::UserNotFound
        })?;

    //Check password against the stored password hash. if it does not verify, error out
    if !bcrypt::verify(&credentials.password, &user.password_hash) {
        return Err(CustomError::WrongPassword);
    }

    let cookie = token_cookie(&state, &user.name)?;
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(json!({ "username": user.name })),
    ))
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for logging out: expire the token cookie.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn logout() -> impl IntoResponse {

    info!("logout request");

    let cookie = "token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0".to_string();
    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(json!({ "message": "Logged out" })),
    )
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for the session check. Absence or invalidity of the cookie is
// not an error here, the client just gets a null back.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn me(    State(state): State<AppState>,
                    cookie: Option<TypedHeader<Cookie>>,
                    ) -> impl IntoResponse {

    let user_name = cookie
        .as_ref()
        .and_then(|TypedHeader(cookie)| check_access(&state, cookie).ok());

    match user_name {
        Some(user_name) => Json(json!({ "username": user_name })),
        None => Json(json!(null)),
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Handler for the leaderboard: every user, best first.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub async fn high_scores(   Extension(pool): Extension<MySqlPool>
                            ) -> Result<impl IntoResponse, CustomError> {

    info!("high scores request");

    let sql = "SELECT name AS username, wins, losses FROM user";
    let scores: Vec<Score> = match sqlx::query_as(sql).fetch_all(&pool).await {
        Ok(scores) => scores,
        Err(err) => {
            error!("Error fetching scores: {:?}", err);
            return Err(CustomError::InternalServerError);
        }
    };

    Ok((StatusCode::OK, Json(rank(scores))))
}
