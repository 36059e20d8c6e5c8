//! The single result channel every command handler returns through.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validation::IdField;

pub type CommandResult<T> = Result<T, CommandError>;

/// An entity a command looks up before mutating membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Plan,
    Procedure,
    User,
    PlanProcedure,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Procedure => "procedure",
            Self::User => "user",
            Self::PlanProcedure => "plan_procedure",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`CommandError`], used by transports to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

/// Why a command failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// An identifier on the command is not a positive integer. Raised before any store access.
    #[error("{message}")]
    BadRequest { field: IdField, message: String },

    /// A referenced plan, procedure, user or plan-procedure row does not exist.
    #[error("{message}")]
    NotFound {
        entity: Entity,
        id: i64,
        message: String,
    },

    /// A store fault or a cancelled request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    pub fn bad_request(field: IdField) -> Self {
        Self::BadRequest {
            field,
            message: format!("Invalid {}", field),
        }
    }

    /// A missing plan, procedure or user, reported as `"<Field>: <id> not found"`.
    pub fn not_found(field: IdField, id: i64) -> Self {
        Self::NotFound {
            entity: field.entity(),
            id,
            message: format!("{}: {} not found", field, id),
        }
    }

    pub fn not_found_with(entity: Entity, id: i64, message: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id,
            message: message.into(),
        }
    }

    pub fn internal(message: impl fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }

    pub fn cancelled() -> Self {
        Self::Internal("request cancelled".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_names_the_field() {
        let err = CommandError::bad_request(IdField::ProcedureId);
        assert_eq!(err.to_string(), "Invalid ProcedureId");
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = CommandError::not_found(IdField::PlanId, 42);
        assert_eq!(err.to_string(), "PlanId: 42 not found");
        match err {
            CommandError::NotFound { entity, id, .. } => {
                assert_eq!(entity, Entity::Plan);
                assert_eq!(id, 42);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn anyhow_errors_become_internal_with_context_chain() {
        let err: CommandError = anyhow::anyhow!("disk full")
            .context("failed to persist plan 1")
            .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(
            err.to_string(),
            "internal error: failed to persist plan 1: disk full"
        );
    }
}
