use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub name: String,
    pub password_hash: String,
    pub wins: u32,
    pub losses: u32,
}

// The struct used for receiving a registration request as json
#[derive(Deserialize, Serialize)]
pub struct Register {
    pub username: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

// The struct used for receiving login credentials as json
#[derive(Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// One leaderboard line
#[derive(Deserialize, Serialize, sqlx::FromRow, Clone, Debug, PartialEq, Eq)]
pub struct Score {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
}

/// Usernames are 3 to 20 ASCII letters or digits.
pub fn valid_username(name: &str) -> bool {
    (3..=20).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Leaderboard order: wins descending, then losses ascending, then
/// username ascending. Total, so the board is stable across refreshes.
pub fn rank(mut scores: Vec<Score>) -> Vec<Score> {
    scores.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(a.losses.cmp(&b.losses))
            .then(a.username.cmp(&b.username))
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(username: &str, wins: u32, losses: u32) -> Score {
        Score {
            username: username.to_string(),
            wins,
            losses,
        }
    }

    #[test]
    fn leaderboard_orders_by_wins_then_losses_then_name() {
        let ranked = rank(vec![score("a", 2, 1), score("b", 2, 0), score("c", 3, 5)]);
        let names: Vec<&str> = ranked.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn leaderboard_ties_break_on_username() {
        let ranked = rank(vec![score("zoe", 1, 1), score("amy", 1, 1)]);
        let names: Vec<&str> = ranked.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zoe"]);
    }

    #[test]
    fn username_rules() {
        assert!(valid_username("abc"));
        assert!(valid_username("Player123"));
        assert!(valid_username("a".repeat(20).as_str()));
        assert!(!valid_username("ab"));
        assert!(!valid_username("a".repeat(21).as_str()));
        assert!(!valid_username("no spaces"));
        assert!(!valid_username("dash-ed"));
        assert!(!valid_username(""));
    }
}
