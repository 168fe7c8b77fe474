use crate::model::*;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("username is already taken")]
    UsernameTaken,
}

impl From<TransactionError<Error>> for Error {
    fn from(err: TransactionError<Error>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => Error::Storage(err),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// Big-endian so that tree iteration follows id, i.e. insertion, order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn abort_encoding<T>(err: bincode::Error) -> ConflictableTransactionResult<T, Error> {
    Err(ConflictableTransactionError::Abort(Error::Encoding(err)))
}

pub trait UserDb {
    type Error;
    /// Returns `None` when the username is already in use.
    fn add_user(
        &self,
        name: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>, Self::Error>;
    fn get_user(&self, id: u64) -> Result<Option<User>, Self::Error>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Self::Error>;
    /// The user with the lowest id, shown as the owner of the list.
    fn first_user(&self) -> Result<Option<User>, Self::Error>;
    fn save_user(&self, user: &User) -> Result<(), Self::Error>;
}

pub trait MovieDb {
    type Error;
    fn list_movies(&self) -> Result<Vec<Movie>, Self::Error>;
    fn add_movie(&self, title: &str, year: &str) -> Result<Movie, Self::Error>;
    fn get_movie(&self, id: u64) -> Result<Option<Movie>, Self::Error>;
    /// Returns `None` when there is no movie with that id.
    fn update_movie(&self, id: u64, title: &str, year: &str)
        -> Result<Option<Movie>, Self::Error>;
    fn delete_movie(&self, id: u64) -> Result<Option<Movie>, Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"users_username";
const MOVIES: &[u8] = b"movies";

impl UserDb for sled::Db {
    type Error = Error;

    fn add_user(&self, name: &str, username: &str, password_hash: &str) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let user = User {
            id: self.generate_id()?,
            name: name.to_owned(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
        };
        let key = serialize_id(user.id);
        let value = bincode::serialize(&user)?;
        let result = (&users, &users_username).transaction(|(users, users_username)| {
            users.insert(&key[..], value.as_slice())?;
            if !user.username.is_empty()
                && users_username
                    .insert(user.username.as_bytes(), &key[..])?
                    .is_some()
            {
                return Err(ConflictableTransactionError::Abort(()));
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(Some(user)),
            Err(TransactionError::Abort(())) => Ok(None),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        Ok(match users.get(serialize_id(id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        if username.is_empty() {
            return Ok(None);
        }
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users = self.open_tree(USERS)?;
        let id = match users_username.get(username)? {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(match users.get(&id)? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => {
                log::warn!("username index points at missing user {:?}", id);
                None
            }
        })
    }

    fn first_user(&self) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        Ok(match users.first()? {
            Some((_, data)) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn save_user(&self, user: &User) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let key = serialize_id(user.id);
        let value = bincode::serialize(user)?;
        (&users, &users_username)
            .transaction(|(users, users_username)| {
                if let Some(old) = users.insert(&key[..], value.as_slice())? {
                    let old: User = match bincode::deserialize(&old) {
                        Ok(old) => old,
                        Err(err) => return abort_encoding(err),
                    };
                    if old.username != user.username && !old.username.is_empty() {
                        users_username.remove(old.username.as_bytes())?;
                    }
                }
                if !user.username.is_empty() {
                    if let Some(owner) =
                        users_username.insert(user.username.as_bytes(), &key[..])?
                    {
                        if owner.as_ref() != &key[..] {
                            return Err(ConflictableTransactionError::Abort(Error::UsernameTaken));
                        }
                    }
                }
                Ok(())
            })
            .map_err(Error::from)
    }
}

impl MovieDb for sled::Db {
    type Error = Error;

    fn list_movies(&self) -> Result<Vec<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        movies
            .iter()
            .values()
            .map(|data| -> Result<Movie> { Ok(bincode::deserialize(&data?)?) })
            .collect()
    }

    fn add_movie(&self, title: &str, year: &str) -> Result<Movie> {
        let movies = self.open_tree(MOVIES)?;
        let movie = Movie {
            id: self.generate_id()?,
            title: title.to_owned(),
            year: year.to_owned(),
        };
        movies.insert(serialize_id(movie.id), bincode::serialize(&movie)?)?;
        Ok(movie)
    }

    fn get_movie(&self, id: u64) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        Ok(match movies.get(serialize_id(id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn update_movie(&self, id: u64, title: &str, year: &str) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        let movie = Movie {
            id,
            title: title.to_owned(),
            year: year.to_owned(),
        };
        let key = serialize_id(id);
        let value = bincode::serialize(&movie)?;
        let updated = movies.transaction(|movies| -> ConflictableTransactionResult<bool, Error> {
            if movies.get(&key[..])?.is_none() {
                return Ok(false);
            }
            movies.insert(&key[..], value.as_slice())?;
            Ok(true)
        })?;
        Ok(if updated { Some(movie) } else { None })
    }

    fn delete_movie(&self, id: u64) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        Ok(match movies.remove(serialize_id(id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }
}

/// Creates the trees, dropping existing data first when `drop` is set.
pub fn reset(db: &sled::Db, drop: bool) -> Result<()> {
    for name in [USERS, USERS_USERNAME, MOVIES] {
        if drop {
            db.drop_tree(name)?;
        }
        db.open_tree(name)?;
    }
    db.flush()?;
    Ok(())
}

const DEMO_OWNER: &str = "Grey Li";

const DEMO_MOVIES: [(&str, &str); 10] = [
    ("My Neighbor Totoro", "1988"),
    ("Dead Poets Society", "1989"),
    ("A Perfect World", "1993"),
    ("Leon", "1994"),
    ("Mahjong", "1996"),
    ("Swallowtail Butterfly", "1996"),
    ("King of Comedy", "1999"),
    ("Devils on the Doorstep", "1999"),
    ("WALL-E", "2008"),
    ("The Pork of Music", "2012"),
];

/// Seeds the demo owner, who has no credentials, and the demo movies.
pub fn forge(db: &sled::Db) -> Result<()> {
    reset(db, false)?;
    db.add_user(DEMO_OWNER, "", "")?;
    for (title, year) in DEMO_MOVIES.iter() {
        db.add_movie(title, year)?;
    }
    db.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn temporary() -> sled::Db {
    sled::Config::new().temporary(true).open().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movies_keep_insertion_order() {
        let db = temporary();
        let titles = ["Leon", "WALL-E", "Mahjong"];
        for title in titles.iter() {
            db.add_movie(title, "1994").unwrap();
        }
        let listed: Vec<_> = db.list_movies().unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(listed, titles);
    }

    #[test]
    fn movie_crud() {
        let db = temporary();
        let movie = db.add_movie("Leon", "1994").unwrap();
        assert_eq!(db.get_movie(movie.id).unwrap(), Some(movie.clone()));

        let updated = db.update_movie(movie.id, "Léon", "1995").unwrap().unwrap();
        assert_eq!(updated.title, "Léon");
        assert_eq!(db.get_movie(movie.id).unwrap(), Some(updated.clone()));

        assert_eq!(db.delete_movie(movie.id).unwrap(), Some(updated));
        assert_eq!(db.get_movie(movie.id).unwrap(), None);
        assert_eq!(db.delete_movie(movie.id).unwrap(), None);
    }

    #[test]
    fn update_missing_movie_creates_nothing() {
        let db = temporary();
        assert_eq!(db.update_movie(42, "Leon", "1994").unwrap(), None);
        assert!(db.list_movies().unwrap().is_empty());
    }

    #[test]
    fn usernames_are_unique() {
        let db = temporary();
        let alice = db.add_user("alice", "alice", "hash").unwrap().unwrap();
        assert_eq!(db.add_user("other", "alice", "hash").unwrap(), None);
        assert_eq!(db.get_user_by_username("alice").unwrap(), Some(alice.clone()));
        assert_eq!(db.get_user(alice.id).unwrap(), Some(alice));
        assert_eq!(db.get_user_by_username("bob").unwrap(), None);
    }

    #[test]
    fn rejected_signup_leaves_no_record() {
        let db = temporary();
        let alice = db.add_user("alice", "alice", "hash").unwrap().unwrap();
        db.add_user("alice", "alice", "hash").unwrap();
        assert_eq!(db.first_user().unwrap(), Some(alice));
        assert_eq!(db.open_tree(USERS).unwrap().len(), 1);
    }

    #[test]
    fn save_user_updates_in_place() {
        let db = temporary();
        let mut alice = db.add_user("alice", "alice", "hash").unwrap().unwrap();
        alice.name = "Alice L.".to_owned();
        db.save_user(&alice).unwrap();
        assert_eq!(db.get_user(alice.id).unwrap().unwrap().name, "Alice L.");
        assert_eq!(db.get_user_by_username("alice").unwrap(), Some(alice));
    }

    #[test]
    fn save_user_moves_username_index() {
        let db = temporary();
        let mut alice = db.add_user("alice", "alice", "hash").unwrap().unwrap();
        let bob = db.add_user("bob", "bob", "hash").unwrap().unwrap();

        alice.username = "bob".to_owned();
        assert!(matches!(db.save_user(&alice), Err(Error::UsernameTaken)));
        assert_eq!(db.get_user_by_username("bob").unwrap(), Some(bob));

        alice.username = "al".to_owned();
        db.save_user(&alice).unwrap();
        assert_eq!(db.get_user_by_username("alice").unwrap(), None);
        assert_eq!(db.get_user_by_username("al").unwrap(), Some(alice));
    }

    #[test]
    fn users_without_username_are_not_indexed() {
        let db = temporary();
        db.add_user("Grey Li", "", "").unwrap().unwrap();
        assert!(db.add_user("Another", "", "").unwrap().is_some());
        assert_eq!(db.get_user_by_username("").unwrap(), None);
    }

    #[test]
    fn forge_seeds_owner_and_movies() {
        let db = temporary();
        forge(&db).unwrap();
        assert_eq!(db.first_user().unwrap().unwrap().name, DEMO_OWNER);
        let movies = db.list_movies().unwrap();
        assert_eq!(movies.len(), 10);
        assert_eq!(movies[0].title, "My Neighbor Totoro");
        assert_eq!(movies[9].year, "2012");
    }

    #[test]
    fn reset_with_drop_clears_everything() {
        let db = temporary();
        forge(&db).unwrap();
        reset(&db, true).unwrap();
        assert!(db.list_movies().unwrap().is_empty());
        assert_eq!(db.first_user().unwrap(), None);

        forge(&db).unwrap();
        reset(&db, false).unwrap();
        assert_eq!(db.list_movies().unwrap().len(), 10);
    }
}
