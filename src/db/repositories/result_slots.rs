use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::db::{helpers::parse_datetime, Database};

#[derive(Debug, Clone, PartialEq)]
pub struct SlotRow {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Replaces the whole value stored under `slot`.
    pub async fn put_slot(
        &self,
        slot: &str,
        value: String,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let slot = slot.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO result_slots (slot, record_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(slot) DO UPDATE SET
                     record_json = excluded.record_json,
                     updated_at = excluded.updated_at",
                params![slot, value, updated_at.to_rfc3339()],
            )
            .with_context(|| format!("failed to write slot {slot}"))?;
            Ok(())
        })
        .await
    }

    pub async fn get_slot(&self, slot: &str) -> Result<Option<SlotRow>> {
        let slot = slot.to_string();
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT record_json, updated_at FROM result_slots WHERE slot = ?1",
                    params![slot],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
                .with_context(|| format!("failed to read slot {slot}"))?;

            row.map(|(value, updated_at)| {
                Ok(SlotRow {
                    value,
                    updated_at: parse_datetime(&updated_at, "updated_at")?,
                })
            })
            .transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn slot_is_overwritten_not_appended() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("slots.sqlite3")).unwrap();

        assert!(db.get_slot("last_score").await.unwrap().is_none());

        let first = Utc::now();
        db.put_slot("last_score", "one".into(), first).await.unwrap();
        db.put_slot("last_score", "two".into(), Utc::now()).await.unwrap();

        let row = db.get_slot("last_score").await.unwrap().unwrap();
        assert_eq!(row.value, "two");
        assert!(row.updated_at >= first);

        let count: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM result_slots", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn slot_survives_reopening_the_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slots.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.put_slot("last_score", "kept".into(), Utc::now())
                .await
                .unwrap();
        }

        let reopened = Database::new(path).unwrap();
        let row = reopened.get_slot("last_score").await.unwrap().unwrap();
        assert_eq!(row.value, "kept");
    }

    #[tokio::test]
    async fn calls_fail_after_shutdown() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("slots.sqlite3")).unwrap();
        db.shutdown();
        assert!(db.get_slot("last_score").await.is_err());
    }
}
