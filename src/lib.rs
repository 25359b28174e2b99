//! # todo-client
//!
//! Client library for the to-do backend: session persistence, the auth
//! lifecycle (restore, login, signup, logout), and the per-user todo
//! dashboard.
//!
//! The `todo-cli` binary drives this crate from the command line; one
//! invocation plays the role of one page load.

pub mod app;
pub mod config;
pub mod error;
pub mod net;
pub mod state;
pub mod util;

#[cfg(test)]
mod test_helpers;
