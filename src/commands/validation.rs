//! Identifier checks applied to every command before the store is touched.

use std::fmt;

use serde::Serialize;

use super::result::{CommandError, CommandResult, Entity};
use crate::models::*;

/// The identifier fields a command can carry, in validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdField {
    PlanId,
    ProcedureId,
    UserId,
}

impl IdField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanId => "PlanId",
            Self::ProcedureId => "ProcedureId",
            Self::UserId => "UserId",
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            Self::PlanId => Entity::Plan,
            Self::ProcedureId => Entity::Procedure,
            Self::UserId => Entity::User,
        }
    }
}

impl fmt::Display for IdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An id is valid iff it is strictly positive.
pub fn validate_id(field: IdField, value: i64) -> CommandResult<i64> {
    if value < 1 {
        return Err(CommandError::bad_request(field));
    }
    Ok(value)
}

/// Check ids in the order given, stopping at the first invalid one.
pub fn validate_ids(ids: &[(IdField, i64)]) -> CommandResult<()> {
    for &(field, value) in ids {
        validate_id(field, value)?;
    }
    Ok(())
}

/// Commands whose identifiers can be checked without a store.
pub trait Validate {
    fn validate(&self) -> CommandResult<()>;
}

impl Validate for AddUserToProcedureCommand {
    fn validate(&self) -> CommandResult<()> {
        validate_ids(&[
            (IdField::PlanId, self.plan_id),
            (IdField::ProcedureId, self.procedure_id),
            (IdField::UserId, self.user_id),
        ])
    }
}

impl Validate for RemoveUserFromProcedureCommand {
    fn validate(&self) -> CommandResult<()> {
        validate_ids(&[
            (IdField::PlanId, self.plan_id),
            (IdField::ProcedureId, self.procedure_id),
            (IdField::UserId, self.user_id),
        ])
    }
}

impl Validate for RemoveAllUsersFromProcedureCommand {
    fn validate(&self) -> CommandResult<()> {
        validate_ids(&[
            (IdField::PlanId, self.plan_id),
            (IdField::ProcedureId, self.procedure_id),
        ])
    }
}
