mod schema;
mod seed;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::models::*;
use crate::store::AssociationStore;

pub use seed::{seed_demo_data, SeedSummary};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    // ============================================================
    // Setup operations (fixtures and seeding)
    // ============================================================

    pub fn create_plan(&self, plan_id: i64) -> Result<Plan> {
        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO plans (plan_id, created_at, updated_at) VALUES (?, ?, ?)",
            (plan_id, now.to_rfc3339(), now.to_rfc3339()),
        )
        .with_context(|| format!("failed to create plan {}", plan_id))?;

        Ok(Plan {
            plan_id,
            procedures: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn create_procedure(&self, procedure_id: i64, title: &str) -> Result<Procedure> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO procedures (procedure_id, procedure_title) VALUES (?, ?)",
            (procedure_id, title),
        )
        .with_context(|| format!("failed to create procedure {}", procedure_id))?;

        Ok(Procedure {
            procedure_id,
            procedure_title: title.to_string(),
        })
    }

    pub fn create_user(&self, user_id: i64, name: &str) -> Result<User> {
        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (user_id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
            (user_id, name, now.to_rfc3339(), now.to_rfc3339()),
        )
        .with_context(|| format!("failed to create user {}", user_id))?;

        Ok(User {
            user_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Link a procedure to a plan, optionally with an initial set of members.
    pub fn add_procedure_to_plan(
        &self,
        plan_id: i64,
        procedure_id: i64,
        user_ids: &[i64],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO plan_procedures (plan_id, procedure_id, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
            (plan_id, procedure_id, &now, &now),
        )
        .with_context(|| {
            format!(
                "failed to add procedure {} to plan {}",
                procedure_id, plan_id
            )
        })?;

        for &user_id in user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO plan_procedure_users (plan_id, procedure_id, user_id, created_at)
                 VALUES (?, ?, ?, ?)",
                (plan_id, procedure_id, user_id, &now),
            )
            .with_context(|| format!("failed to assign user {}", user_id))?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Member ids of one plan-procedure, ascending. Empty if the row does not exist.
    pub fn get_member_ids(&self, plan_id: i64, procedure_id: i64) -> Result<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM plan_procedure_users
             WHERE plan_id = ? AND procedure_id = ? ORDER BY user_id",
        )?;

        let ids = stmt
            .query_map((plan_id, procedure_id), |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    pub fn user_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ============================================================
    // Association operations
    // ============================================================

    pub fn find_plan_with_associations(&self, plan_id: i64) -> Result<Option<Plan>> {
        let conn = self.lock()?;

        let plan_row = conn
            .query_row(
                "SELECT created_at, updated_at FROM plans WHERE plan_id = ?",
                [plan_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((created_at, updated_at)) = plan_row else {
            return Ok(None);
        };

        let mut members: BTreeMap<i64, Vec<User>> = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT ppu.procedure_id, u.user_id, u.name, u.created_at, u.updated_at
             FROM plan_procedure_users ppu
             JOIN users u ON u.user_id = ppu.user_id
             WHERE ppu.plan_id = ?
             ORDER BY ppu.procedure_id, u.user_id",
        )?;
        let rows = stmt.query_map([plan_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                User {
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                    updated_at: parse_datetime(row.get::<_, String>(4)?),
                },
            ))
        })?;
        for row in rows {
            let (procedure_id, user) = row?;
            members.entry(procedure_id).or_default().push(user);
        }

        let mut stmt = conn.prepare(
            "SELECT procedure_id, created_at, updated_at
             FROM plan_procedures WHERE plan_id = ? ORDER BY procedure_id",
        )?;
        let procedures: Vec<PlanProcedure> = stmt
            .query_map([plan_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(procedure_id, created, updated)| {
                PlanProcedure::new(
                    plan_id,
                    procedure_id,
                    members.remove(&procedure_id).unwrap_or_default(),
                    parse_datetime(created),
                    parse_datetime(updated),
                )
            })
            .collect();

        Ok(Some(Plan {
            plan_id,
            procedures,
            created_at: parse_datetime(created_at),
            updated_at: parse_datetime(updated_at),
        }))
    }

    pub fn find_procedure(&self, procedure_id: i64) -> Result<Option<Procedure>> {
        let conn = self.lock()?;
        let procedure = conn
            .query_row(
                "SELECT procedure_id, procedure_title FROM procedures WHERE procedure_id = ?",
                [procedure_id],
                |row| {
                    Ok(Procedure {
                        procedure_id: row.get(0)?,
                        procedure_title: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(procedure)
    }

    pub fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT user_id, name, created_at, updated_at FROM users WHERE user_id = ?",
                [user_id],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: parse_datetime(row.get::<_, String>(2)?),
                        updated_at: parse_datetime(row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    /// Write the membership differences of every association on the plan in one transaction.
    ///
    /// Returns the number of associations that changed. Touched associations and the plan
    /// get their `updated_at` bumped.
    pub fn save_memberships(&self, plan: &Plan) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut touched = 0;

        for pp in &plan.procedures {
            let changes = pp.pending_changes();
            if changes.is_empty() {
                continue;
            }

            for user_id in changes.removed {
                tx.execute(
                    "DELETE FROM plan_procedure_users
                     WHERE plan_id = ? AND procedure_id = ? AND user_id = ?",
                    (pp.plan_id, pp.procedure_id, user_id),
                )?;
            }

            for user_id in changes.added {
                tx.execute(
                    "INSERT OR IGNORE INTO plan_procedure_users (plan_id, procedure_id, user_id, created_at)
                     VALUES (?, ?, ?, ?)",
                    (pp.plan_id, pp.procedure_id, user_id, &now),
                )
                .with_context(|| {
                    format!(
                        "failed to assign user {} to procedure {}",
                        user_id, pp.procedure_id
                    )
                })?;
            }

            tx.execute(
                "UPDATE plan_procedures SET updated_at = ? WHERE plan_id = ? AND procedure_id = ?",
                (&now, pp.plan_id, pp.procedure_id),
            )?;
            touched += 1;
        }

        if touched > 0 {
            tx.execute(
                "UPDATE plans SET updated_at = ? WHERE plan_id = ?",
                (&now, plan.plan_id),
            )?;
        }

        tx.commit()
            .with_context(|| format!("failed to commit plan {}", plan.plan_id))?;
        Ok(touched)
    }
}

#[async_trait]
impl AssociationStore for Database {
    async fn get_plan_with_associations(&self, plan_id: i64) -> Result<Option<Plan>> {
        self.find_plan_with_associations(plan_id)
    }

    async fn get_procedure(&self, procedure_id: i64) -> Result<Option<Procedure>> {
        self.find_procedure(procedure_id)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.find_user(user_id)
    }

    async fn persist(&self, plan: &Plan) -> Result<()> {
        let touched = self.save_memberships(plan)?;
        tracing::debug!(plan_id = plan.plan_id, touched, "persisted plan memberships");
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Location of the database when none is configured.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "procedure-roster")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("roster.db"))
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
