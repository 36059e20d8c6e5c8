//! The gateway the command handlers use to reach persisted state.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Plan, Procedure, User};

/// Narrow view of the persistence engine needed by the membership commands.
///
/// Lookups return `Ok(None)` for a missing row; `Err` is reserved for store faults.
/// [`persist`](AssociationStore::persist) writes every pending membership change of the
/// plan in a single transaction, or none of them.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Load a plan with its procedure associations and each association's members.
    async fn get_plan_with_associations(&self, plan_id: i64) -> Result<Option<Plan>>;

    async fn get_procedure(&self, procedure_id: i64) -> Result<Option<Procedure>>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    async fn persist(&self, plan: &Plan) -> Result<()>;
}
