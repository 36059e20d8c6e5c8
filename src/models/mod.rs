//! Domain models for the procedure roster.
//!
//! # Core Concepts
//!
//! - [`Plan`]: a repair plan, the aggregate root. Owns its [`PlanProcedure`] rows.
//! - [`Procedure`]: a reusable procedure definition referenced by many plans.
//! - [`PlanProcedure`]: one procedure scheduled on one plan. Owns the membership set of
//!   [`User`]s assigned to it.
//! - [`User`]: someone who can be assigned to procedures. Never owned by a plan; removing a
//!   membership only detaches the user.
//!
//! Plans, procedures, users and plan-procedure rows are created elsewhere. This crate only
//! mutates membership sets, driven by command values such as
//! [`AddUserToProcedureCommand`].

mod command;
mod plan;
mod procedure;
mod user;

pub use command::*;
pub use plan::*;
pub use procedure::*;
pub use user::*;
