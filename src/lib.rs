//! Library to backup the MySQL databases of a [DreamHost][dh] account.
//!
//! Databases are discovered through the [DreamHost API][api], dumped to disk
//! and replicated to the account's [backup user][backup]. The individual
//! steps are located in the [`backends`] module, [`job`] drives a whole run.
//!
//! [dh]: https://www.dreamhost.com/
//! [api]: https://help.dreamhost.com/hc/en-us/articles/217560167-API-overview
//! [backup]: https://help.dreamhost.com/hc/en-us/articles/217665188-Backup-user-overview

#![forbid(unsafe_code)]

pub mod backends;
pub mod cli;
pub mod config;
pub mod dreamhost;
pub mod job;
pub mod util;
