//! Access to the [DreamHost API][api].
//!
//! Requests are form encoded POSTs, replies are tab separated tables, see
//! [Response] for the format.
//!
//! [api]: https://help.dreamhost.com/hc/en-us/articles/217560167-API-overview

mod api;
mod response;

pub use api::{Api, HttpTransport, Transport, DEFAULT_API_URL};
pub use response::{Record, Response};

use derive_more::{Display, Error, From};

/// Lists every MySQL user together with the database it has access to.
pub const CMD_MYSQL_LIST_USERS: &str = "mysql-list_users";
/// Lists the users of the account, without their passwords.
pub const CMD_LIST_USERS: &str = "user-list_users_no_pw";

#[derive(Debug, Display, Error, From)]
/// Errors talking to the DreamHost API.
pub enum ApiError {
    /// The request couldn't be delivered or the server refused it.
    #[display("API request failed: {_0}")]
    #[from]
    Transport(reqwest::Error),
    /// The reply lacks the lines its status requires.
    #[display("Malformed reply to API command {cmd}")]
    Malformed { cmd: String },
    /// The API answered with an error status.
    #[display("API command {cmd} failed: {message}")]
    Remote { cmd: String, message: String },
}
