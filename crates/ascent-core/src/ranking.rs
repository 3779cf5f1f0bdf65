//! Candidate strengths and weaknesses ranked by T-score. Pure reads.

use crate::error::Result;
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTrait {
    pub id: String,
    pub name: String,
    pub t_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopBottom {
    /// Top 5 by T-score, descending.
    pub strengths: Vec<RankedTrait>,
    /// Bottom 5 by T-score, ascending.
    pub weaknesses: Vec<RankedTrait>,
}

impl Store {
    /// Top and bottom five scored traits for a user. Unscored traits are
    /// excluded; ties break on trait name ascending so output is stable.
    pub fn top_bottom_five(&self, user_id: &str) -> Result<TopBottom> {
        let mut scored: Vec<RankedTrait> = self
            .trait_defs(user_id)?
            .into_iter()
            .filter_map(|d| {
                d.t_score.map(|t| RankedTrait {
                    id: d.id,
                    name: d.name,
                    t_score: t,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.t_score
                .partial_cmp(&a.t_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        let strengths: Vec<RankedTrait> = scored.iter().take(5).cloned().collect();

        scored.sort_by(|a, b| {
            a.t_score
                .partial_cmp(&b.t_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        let weaknesses: Vec<RankedTrait> = scored.iter().take(5).cloned().collect();

        Ok(TopBottom {
            strengths,
            weaknesses,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
