pub mod game;
pub mod grid;
pub mod user;
