use tokio_util::sync::CancellationToken;

use super::{
    association_mut, load_plan, load_procedure, observe, persist, CommandError, CommandResult,
    Entity, Validate,
};
use crate::models::RemoveUserFromProcedureCommand;
use crate::store::AssociationStore;

/// Detaches a user from a plan's procedure.
///
/// The user must exist, but need not be a member: removing a non-member succeeds and
/// leaves the membership unchanged.
pub struct RemoveUserFromProcedureHandler<S> {
    store: S,
}

impl<S: AssociationStore> RemoveUserFromProcedureHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        command: RemoveUserFromProcedureCommand,
        cancel: &CancellationToken,
    ) -> CommandResult<()> {
        command.validate()?;

        let mut plan = load_plan(&self.store, command.plan_id, cancel).await?;
        let procedure = load_procedure(&self.store, command.procedure_id, cancel).await?;
        let user = observe(cancel, "load user", self.store.get_user(command.user_id))
            .await?
            .ok_or_else(|| {
                CommandError::not_found_with(
                    Entity::User,
                    command.user_id,
                    "No user found for the given Ids",
                )
            })?;

        let plan_procedure = association_mut(&mut plan, procedure.procedure_id)?;
        if !plan_procedure.remove_user(user.user_id) {
            tracing::debug!(
                plan_id = command.plan_id,
                procedure_id = command.procedure_id,
                user_id = command.user_id,
                "user was not assigned"
            );
        }

        persist(&self.store, &plan, cancel).await?;

        tracing::info!(
            plan_id = command.plan_id,
            procedure_id = command.procedure_id,
            user_id = command.user_id,
            "removed user from procedure"
        );
        Ok(())
    }
}
