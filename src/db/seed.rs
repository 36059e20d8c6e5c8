//! Demo data for local development, loaded by `roster seed`.

use anyhow::Result;

use super::Database;

const USERS: &[(i64, &str)] = &[
    (1, "Avery Quinn"),
    (2, "Jordan Ellis"),
    (3, "Sam Patel"),
    (4, "Riley Chen"),
    (5, "Morgan Reyes"),
];

const PROCEDURES: &[(i64, &str)] = &[
    (1, "Remove And Replace Front Bumper"),
    (2, "Refinish Hood"),
    (3, "Repair Left Quarter Panel"),
    (4, "Replace Windshield"),
    (5, "Four Wheel Alignment"),
];

/// Procedures linked to the demo plan.
const DEMO_PLAN_ID: i64 = 1;
const DEMO_PLAN_PROCEDURES: &[i64] = &[1, 2, 3];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub procedures: usize,
    pub plan_procedures: usize,
}

/// Insert the demo users, procedures and plan. Does nothing if users already exist.
pub fn seed_demo_data(db: &Database) -> Result<SeedSummary> {
    if db.user_count()? > 0 {
        tracing::info!("Database already has users, skipping seed");
        return Ok(SeedSummary::default());
    }

    for &(id, name) in USERS {
        db.create_user(id, name)?;
    }
    for &(id, title) in PROCEDURES {
        db.create_procedure(id, title)?;
    }

    db.create_plan(DEMO_PLAN_ID)?;
    for &procedure_id in DEMO_PLAN_PROCEDURES {
        db.add_procedure_to_plan(DEMO_PLAN_ID, procedure_id, &[])?;
    }

    let summary = SeedSummary {
        users: USERS.len(),
        procedures: PROCEDURES.len(),
        plan_procedures: DEMO_PLAN_PROCEDURES.len(),
    };
    tracing::info!(?summary, "Seeded demo data");
    Ok(summary)
}
