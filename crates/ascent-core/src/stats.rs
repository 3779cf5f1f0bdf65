//! Population-norms refresher.
//!
//! Re-estimates each trait's average and standard deviation from the raw
//! scores of the most recently registered users, then propagates the new
//! norms to every user's definitions and recomputes their T-scores. Runs
//! only from the scheduler's poll loop, never on the request path; it reads
//! a registry that may be written concurrently and settles on eventual
//! convergence.

use crate::error::Result;
use crate::registry::t_score;
use crate::store::{ts, Store};
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormsUpdate {
    pub trait_name: String,
    pub average: f64,
    pub std_dev: f64,
    pub sample: usize,
}

/// Population mean and standard deviation (not the sample estimator).
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

impl Store {
    /// Refresh trait norms from the raw scores of the most recently
    /// registered `sample_size` users. Traits with fewer than two scored
    /// samples keep their current norms — one sample carries no spread.
    pub fn refresh_norms(&self, sample_size: u32) -> Result<Vec<NormsUpdate>> {
        let users = self.recent_users(sample_size)?;
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=users.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT name, raw_score FROM trait_defs
             WHERE raw_score IS NOT NULL AND user_id IN ({})",
            placeholders.join(", ")
        );
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for r in rows {
                let (name, raw) = r?;
                samples.entry(name).or_default().push(raw as f64);
            }
        }

        let mut updates = Vec::new();
        let tx = self.conn.unchecked_transaction()?;
        for (name, values) in &samples {
            if values.len() < 2 {
                continue;
            }
            let (average, std_dev) = mean_and_std(values);
            tx.execute(
                "UPDATE trait_norms SET average = ?1, std_dev = ?2, updated_at = ?3
                 WHERE name = ?4",
                params![average, std_dev, ts(Utc::now()), name],
            )?;
            tx.execute(
                "UPDATE trait_defs SET average = ?1, std_dev = ?2 WHERE name = ?3",
                params![average, std_dev, name],
            )?;
            // Standing T-scores move with the norms.
            let scored: Vec<(String, i64)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, raw_score FROM trait_defs
                     WHERE name = ?1 AND raw_score IS NOT NULL",
                )?;
                let rows = stmt.query_map([name], |row| Ok((row.get(0)?, row.get(1)?)))?;
                let mut v = Vec::new();
                for r in rows {
                    v.push(r?);
                }
                v
            };
            for (id, raw) in scored {
                tx.execute(
                    "UPDATE trait_defs SET t_score = ?1 WHERE id = ?2",
                    params![t_score(raw, average, std_dev), id],
                )?;
            }
            updates.push(NormsUpdate {
                trait_name: name.clone(),
                average,
                std_dev,
                sample: values.len(),
            });
        }
        tx.commit()?;
        Ok(updates)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
