use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error};

/// Passwords of MySQL users, keyed by user name.
///
/// The API never reveals passwords, so every entry is supplied by the
/// operator.
#[derive(Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    users: BTreeMap<String, String>,
}

impl Credentials {
    /// The configured password of `user`.
    pub fn password_for(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(String::as_str)
    }

    /// Adds or replaces the password of `user`.
    pub fn insert(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.users.insert(user.into(), password.into());
    }

    /// Overrides entries of `self` with those of `other`.
    pub fn merge(&mut self, other: Credentials) {
        self.users.extend(other.users);
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.users.keys().map(|user| (user, "***")))
            .finish()
    }
}

impl FromIterator<Credential> for Credentials {
    fn from_iter<T: IntoIterator<Item = Credential>>(iter: T) -> Self {
        let users = iter
            .into_iter()
            .map(|Credential { user, password }| (user, password))
            .collect();
        Self { users }
    }
}

/// A single `USER=PASSWORD` pair given on the command line.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=***", self.user)
    }
}

/// Credential isn't of the form `USER=PASSWORD`.
#[derive(Debug, Display, Error)]
#[display("Expected USER=PASSWORD, got '{_0}'")]
pub struct InvalidCredential(#[error(ignore)] String);

impl FromStr for Credential {
    type Err = InvalidCredential;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((user, password)) if !user.is_empty() && !password.is_empty() => Ok(Self {
                user: user.to_string(),
                password: password.to_string(),
            }),
            _ => Err(InvalidCredential(s.split('=').next().unwrap_or_default().to_string())),
        }
    }
}
