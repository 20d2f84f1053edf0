use std::sync::Arc;

use libsql::{Connection, Database, Row, Rows, params};
use tokio::sync::Mutex;
use tracing::info;

use super::{HouseRule, HouseRuleId, HouseRuleInput};
use crate::db;
use crate::error::{Error, Result};

/// The reference rules written by [`Store::reseed`], in order.
pub const SEED_RULES: [&str; 11] = [
    "2 guests maximum.",
    "No parties or events.",
    "No smoking allowed.",
    "No commercial photography",
    "Suitable for toddlers and children under 12.",
    "No eating or drinking in bedrooms.",
    "Please respect check-in and check-out times. ",
    "Please don\u{2019}t rearrange the furniture.",
    "No illegal substances allowed on the premises.",
    "Please take the trash out before you leave.",
    "Other",
];

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS house_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule TEXT NOT NULL
)";

/// House-rule persistence.
///
/// Every operation holds the connection lock for its whole duration, so a
/// reseed transaction never interleaves with another request's statements.
/// A `:memory:` database only exists on the connection that created it,
/// which rules out a connection per operation.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open the store, creating the table if needed.
    pub async fn open(database: &Database) -> Result<Self> {
        let conn = db::connection(database)?;
        conn.execute(CREATE_TABLE, ()).await?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// All rules in insertion order.
    pub async fn list(&self) -> Result<Vec<HouseRule>> {
        let conn = self.conn.lock().await;
        let rows = conn
            .query("SELECT id, rule FROM house_rules ORDER BY id", ())
            .await?;
        collect(rows).await
    }

    pub async fn create(&self, input: &HouseRuleInput) -> Result<HouseRule> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "INSERT INTO house_rules (rule) VALUES (?1) RETURNING id, rule",
                params![input.rule.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => from_row(&row),
            None => Err(Error::Internal("Error creating house rule".into())),
        }
    }

    /// Replace the text of an existing rule.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when no rule has `id`; nothing is written.
    pub async fn update(&self, input: &HouseRuleInput, id: HouseRuleId) -> Result<HouseRule> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "UPDATE house_rules SET rule = ?1 WHERE id = ?2 RETURNING id, rule",
                params![input.rule.as_str(), id.id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => from_row(&row),
            None => Err(Error::NotFound("house rule not found".into())),
        }
    }

    /// Delete a rule. Deleting a missing id is not an error.
    pub async fn delete(&self, id: HouseRuleId) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM house_rules WHERE id = ?1", params![id.id])
            .await?;
        Ok(())
    }

    /// Replace every rule with [`SEED_RULES`].
    pub async fn reseed(&self) -> Result<Vec<HouseRule>> {
        let conn = self.conn.lock().await;
        let tx = conn.transaction().await?;
        tx.execute("DELETE FROM house_rules", ()).await?;

        let mut seeded = Vec::with_capacity(SEED_RULES.len());
        for rule in SEED_RULES {
            let mut rows = tx
                .query(
                    "INSERT INTO house_rules (rule) VALUES (?1) RETURNING id, rule",
                    params![rule],
                )
                .await?;
            if let Some(row) = rows.next().await? {
                seeded.push(from_row(&row)?);
            }
        }
        tx.commit().await?;
        drop(conn);

        info!(count = seeded.len(), "Reseeded house rules");
        Ok(seeded)
    }
}

fn from_row(row: &Row) -> Result<HouseRule> {
    Ok(HouseRule {
        id: row.get(0)?,
        rule: row.get(1)?,
    })
}

async fn collect(mut rows: Rows) -> Result<Vec<HouseRule>> {
    let mut rules = Vec::new();
    while let Some(row) = rows.next().await? {
        rules.push(from_row(&row)?);
    }
    Ok(rules)
}
