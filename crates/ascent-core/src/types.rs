use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TraitKind
// ---------------------------------------------------------------------------

/// Whether a chosen trait is being developed as a strength or shored up as a
/// weakness. Every development plan carries exactly one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Strength,
    Weakness,
}

impl TraitKind {
    pub fn all() -> &'static [TraitKind] {
        &[TraitKind::Strength, TraitKind::Weakness]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TraitKind::Strength => "strength",
            TraitKind::Weakness => "weakness",
        }
    }

    /// Uppercase tag used in generated form names.
    pub fn form_tag(self) -> &'static str {
        match self {
            TraitKind::Strength => "STRENGTH",
            TraitKind::Weakness => "WEAKNESS",
        }
    }

    pub fn other(self) -> TraitKind {
        match self {
            TraitKind::Strength => TraitKind::Weakness,
            TraitKind::Weakness => TraitKind::Strength,
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TraitKind {
    type Err = crate::error::AscentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strength" | "STRENGTH" => Ok(TraitKind::Strength),
            "weakness" | "WEAKNESS" => Ok(TraitKind::Weakness),
            _ => Err(crate::error::AscentError::InvalidTraitKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Extent
// ---------------------------------------------------------------------------

/// Five-point ordinal self-rating scale used in follow-up questionnaires.
///
/// Ordering matters: the practice-recommendation algorithm prefers the lowest
/// extents first, so `NotAtAll < SmallExtent < … < FullestExtent` must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Extent {
    #[serde(rename = "Not at All")]
    NotAtAll,
    #[serde(rename = "To a Small Extent")]
    SmallExtent,
    #[serde(rename = "To a Moderate Extent")]
    ModerateExtent,
    #[serde(rename = "To a Large Extent")]
    LargeExtent,
    #[serde(rename = "To the Fullest Extent")]
    FullestExtent,
}

impl Extent {
    pub fn all() -> &'static [Extent] {
        &[
            Extent::NotAtAll,
            Extent::SmallExtent,
            Extent::ModerateExtent,
            Extent::LargeExtent,
            Extent::FullestExtent,
        ]
    }

    /// Ordinal position on the scale, 0 (lowest) through 4 (highest).
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<Extent> {
        Extent::all().get(n as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Extent::NotAtAll => "Not at All",
            Extent::SmallExtent => "To a Small Extent",
            Extent::ModerateExtent => "To a Moderate Extent",
            Extent::LargeExtent => "To a Large Extent",
            Extent::FullestExtent => "To the Fullest Extent",
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Extent {
    type Err = crate::error::AscentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not at All" => Ok(Extent::NotAtAll),
            "To a Small Extent" => Ok(Extent::SmallExtent),
            "To a Moderate Extent" => Ok(Extent::ModerateExtent),
            "To a Large Extent" => Ok(Extent::LargeExtent),
            "To the Fullest Extent" => Ok(Extent::FullestExtent),
            _ => Err(crate::error::AscentError::UnknownExtent(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
