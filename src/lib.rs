//! Assignment of users to the procedures of a repair plan.
//!
//! The crate is layered the same way a request flows through it:
//!
//! - [`models`]: plan aggregate, procedures, users and command values.
//! - [`commands`]: validation, the [`commands::CommandError`] result channel and the
//!   three membership handlers.
//! - [`store`]: the [`store::AssociationStore`] gateway the handlers depend on.
//! - [`db`]: the SQLite implementation of that gateway.
//! - [`api`]: HTTP transport mapping commands to routes and errors to status codes.

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod store;
