use tokio_util::sync::CancellationToken;

use super::{
    association_mut, load_plan, load_procedure, observe, persist, CommandError, CommandResult,
    IdField, Validate,
};
use crate::models::AddUserToProcedureCommand;
use crate::store::AssociationStore;

/// Assigns a user to a plan's procedure. Assigning an existing member succeeds without
/// touching the store.
pub struct AddUserToProcedureHandler<S> {
    store: S,
}

impl<S: AssociationStore> AddUserToProcedureHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        command: AddUserToProcedureCommand,
        cancel: &CancellationToken,
    ) -> CommandResult<()> {
        command.validate()?;

        let mut plan = load_plan(&self.store, command.plan_id, cancel).await?;
        let procedure = load_procedure(&self.store, command.procedure_id, cancel).await?;
        let user = observe(cancel, "load user", self.store.get_user(command.user_id))
            .await?
            .ok_or_else(|| CommandError::not_found(IdField::UserId, command.user_id))?;

        let plan_procedure = association_mut(&mut plan, procedure.procedure_id)?;
        if plan_procedure.contains(user.user_id) {
            tracing::debug!(
                plan_id = command.plan_id,
                procedure_id = command.procedure_id,
                user_id = command.user_id,
                "user already assigned"
            );
            return Ok(());
        }
        plan_procedure.add_user(user);

        persist(&self.store, &plan, cancel).await?;

        tracing::info!(
            plan_id = command.plan_id,
            procedure_id = command.procedure_id,
            user_id = command.user_id,
            "assigned user to procedure"
        );
        Ok(())
    }
}
