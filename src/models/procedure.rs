use serde::{Deserialize, Serialize};

/// A procedure definition. Plans reference procedures through [`super::PlanProcedure`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub procedure_id: i64,
    pub procedure_title: String,
}
