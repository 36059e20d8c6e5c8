//! Membership commands: assign a user, remove a user, remove all users.
//!
//! Every handler runs the same phases: validate the ids, load the plan aggregate and the
//! referenced entities, mutate the membership set in memory, persist once. Each phase
//! reports failure through [`CommandError`]; nothing escapes the handler any other way.

mod add_user;
mod remove_all_users;
mod remove_user;
mod result;
mod validation;

use std::future::Future;

use tokio_util::sync::CancellationToken;

pub use add_user::AddUserToProcedureHandler;
pub use remove_all_users::RemoveAllUsersFromProcedureHandler;
pub use remove_user::RemoveUserFromProcedureHandler;
pub use result::{CommandError, CommandResult, Entity, ErrorKind};
pub use validation::{validate_id, validate_ids, IdField, Validate};

use crate::models::{Plan, PlanProcedure, Procedure};
use crate::store::AssociationStore;

/// Run one store call, giving up early if the request is cancelled.
async fn observe<T, F>(cancel: &CancellationToken, step: &str, call: F) -> CommandResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(step, "command cancelled");
            Err(CommandError::cancelled())
        }
        result = call => result.map_err(|e| {
            tracing::error!(step, "store failure: {:#}", e);
            CommandError::internal(format!("failed to {}: {:#}", step, e))
        }),
    }
}

async fn load_plan<S: AssociationStore>(
    store: &S,
    plan_id: i64,
    cancel: &CancellationToken,
) -> CommandResult<Plan> {
    observe(cancel, "load plan", store.get_plan_with_associations(plan_id))
        .await?
        .ok_or_else(|| CommandError::not_found(IdField::PlanId, plan_id))
}

async fn load_procedure<S: AssociationStore>(
    store: &S,
    procedure_id: i64,
    cancel: &CancellationToken,
) -> CommandResult<Procedure> {
    observe(cancel, "load procedure", store.get_procedure(procedure_id))
        .await?
        .ok_or_else(|| CommandError::not_found(IdField::ProcedureId, procedure_id))
}

/// The association linking `procedure_id` to the loaded plan.
fn association_mut(plan: &mut Plan, procedure_id: i64) -> CommandResult<&mut PlanProcedure> {
    let plan_id = plan.plan_id;
    plan.procedure_mut(procedure_id).ok_or_else(|| {
        CommandError::not_found_with(
            Entity::PlanProcedure,
            procedure_id,
            format!("No procedure {} on plan {}", procedure_id, plan_id),
        )
    })
}

/// Write the plan's pending changes. Once started, the write is not interrupted.
async fn persist<S: AssociationStore>(
    store: &S,
    plan: &Plan,
    cancel: &CancellationToken,
) -> CommandResult<()> {
    if cancel.is_cancelled() {
        tracing::debug!(plan_id = plan.plan_id, "command cancelled before persist");
        return Err(CommandError::cancelled());
    }

    store.persist(plan).await.map_err(|e| {
        tracing::error!(plan_id = plan.plan_id, "persist failed: {:#}", e);
        CommandError::internal(format!("failed to persist plan: {:#}", e))
    })
}
