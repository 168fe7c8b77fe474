use serde::{Deserialize, Serialize};

pub const NAME_MAX_LEN: usize = 20;
pub const USERNAME_MAX_LEN: usize = 20;
pub const TITLE_MAX_LEN: usize = 60;
pub const YEAR_MAX_LEN: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub password_hash: String,
}

/// The part of a [`User`] that templates are allowed to see.
#[derive(Serialize, Debug)]
pub struct UserView {
    pub id: u64,
    pub name: String,
    pub username: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub year: String,
}

fn within_bounds(value: &str, max_len: usize) -> bool {
    !value.is_empty() && value.chars().count() <= max_len
}

pub fn valid_movie(title: &str, year: &str) -> bool {
    within_bounds(title, TITLE_MAX_LEN) && within_bounds(year, YEAR_MAX_LEN)
}

pub fn valid_name(name: &str) -> bool {
    within_bounds(name, NAME_MAX_LEN)
}

pub fn valid_username(username: &str) -> bool {
    within_bounds(username, USERNAME_MAX_LEN)
}
