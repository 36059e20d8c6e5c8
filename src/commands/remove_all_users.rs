use tokio_util::sync::CancellationToken;

use super::{association_mut, load_plan, load_procedure, persist, CommandResult, Validate};
use crate::models::RemoveAllUsersFromProcedureCommand;
use crate::store::AssociationStore;

/// Empties the membership set of a plan's procedure. An already-empty set is left alone.
pub struct RemoveAllUsersFromProcedureHandler<S> {
    store: S,
}

impl<S: AssociationStore> RemoveAllUsersFromProcedureHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        command: RemoveAllUsersFromProcedureCommand,
        cancel: &CancellationToken,
    ) -> CommandResult<()> {
        command.validate()?;

        let mut plan = load_plan(&self.store, command.plan_id, cancel).await?;
        let procedure = load_procedure(&self.store, command.procedure_id, cancel).await?;

        let plan_procedure = association_mut(&mut plan, procedure.procedure_id)?;
        if plan_procedure.is_empty() {
            tracing::debug!(
                plan_id = command.plan_id,
                procedure_id = command.procedure_id,
                "procedure has no assigned users"
            );
            return Ok(());
        }
        let removed = plan_procedure.clear_users();

        persist(&self.store, &plan, cancel).await?;

        tracing::info!(
            plan_id = command.plan_id,
            procedure_id = command.procedure_id,
            removed,
            "removed all users from procedure"
        );
        Ok(())
    }
}
