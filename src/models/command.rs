use serde::{Deserialize, Deserializer, Serialize};

// Ids that are missing, null, fractional, out of range or not numbers all
// deserialize to 0, so they fail validation with the field named instead of
// failing to parse.

/// Assign one user to a procedure on a plan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AddUserToProcedureCommand {
    #[serde(deserialize_with = "lenient_id")]
    pub plan_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub procedure_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: i64,
}

/// Detach one user from a procedure on a plan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveUserFromProcedureCommand {
    #[serde(deserialize_with = "lenient_id")]
    pub plan_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub procedure_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub user_id: i64,
}

/// Detach every user from a procedure on a plan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveAllUsersFromProcedureCommand {
    #[serde(deserialize_with = "lenient_id")]
    pub plan_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub procedure_id: i64,
}

/// Read an id as an `i64`, mapping anything that is not a representable integer to 0.
fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().unwrap_or(0))
}
