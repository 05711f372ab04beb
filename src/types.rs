//! Data types shared by the loaders, summarizer and comparator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AccessError, Result};

/// Number of leading geocode characters that identify a census tract
/// (2 state + 3 county + 6 tract).
pub const TRACT_ID_LEN: usize = 11;

/// An 11-character census tract GEOID.
///
/// Always held as a string so leading zeros survive every join.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TractId(String);

impl TractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the tract id from a block-level geocode by keeping its first
    /// [`TRACT_ID_LEN`] characters.
    pub fn from_geocode(geocode: &str) -> Result<Self> {
        let geocode = geocode.trim();
        match geocode.get(..TRACT_ID_LEN) {
            Some(prefix) => Ok(Self(prefix.to_string())),
            None => Err(AccessError::InvalidGeocode(geocode.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four fixed wage categories carried by LODES job and worker tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IncomeTier {
    Low,
    Mid,
    High,
    Total,
}

impl IncomeTier {
    pub const ALL: [IncomeTier; 4] = [
        IncomeTier::Low,
        IncomeTier::Mid,
        IncomeTier::High,
        IncomeTier::Total,
    ];

    /// Column name in block-level LODES files.
    pub fn lodes_column(self) -> &'static str {
        match self {
            IncomeTier::Low => "CE01",
            IncomeTier::Mid => "CE02",
            IncomeTier::High => "CE03",
            IncomeTier::Total => "C000",
        }
    }

    /// Short label used by tract-aggregated inputs and every output column.
    pub fn label(self) -> &'static str {
        match self {
            IncomeTier::Low => "LI",
            IncomeTier::Mid => "MI",
            IncomeTier::High => "HI",
            IncomeTier::Total => "TOT",
        }
    }

    fn index(self) -> usize {
        match self {
            IncomeTier::Low => 0,
            IncomeTier::Mid => 1,
            IncomeTier::High => 2,
            IncomeTier::Total => 3,
        }
    }
}

impl fmt::Display for IncomeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One optional value per income tier. `None` means missing, not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TierValues([Option<f64>; 4]);

impl TierValues {
    /// Values with every listed tier set to zero and the rest missing.
    pub fn zeroed(tiers: &[IncomeTier]) -> Self {
        let mut values = Self::default();
        for &tier in tiers {
            values.set(tier, Some(0.0));
        }
        values
    }

    pub fn get(&self, tier: IncomeTier) -> Option<f64> {
        self.0[tier.index()]
    }

    pub fn set(&mut self, tier: IncomeTier, value: Option<f64>) {
        self.0[tier.index()] = value;
    }

    /// Adds `value` to the tier, treating a missing slot as zero.
    pub fn add(&mut self, tier: IncomeTier, value: f64) {
        let slot = &mut self.0[tier.index()];
        *slot = Some(slot.unwrap_or(0.0) + value);
    }
}

/// Job or worker counts keyed by tract id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobTable {
    /// Tiers the source file actually provided, in [`IncomeTier::ALL`] order.
    pub tiers: Vec<IncomeTier>,
    pub rows: BTreeMap<TractId, TierValues>,
}

impl JobTable {
    pub fn new(tiers: Vec<IncomeTier>) -> Self {
        Self {
            tiers,
            rows: BTreeMap::new(),
        }
    }

    pub fn get(&self, tract: &TractId) -> Option<&TierValues> {
        self.rows.get(tract)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-origin sums of reachable job counts for one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessibilitySummary {
    pub threshold_minutes: u32,
    pub tiers: Vec<IncomeTier>,
    pub rows: BTreeMap<TractId, TierValues>,
}

impl AccessibilitySummary {
    pub fn get(&self, origin: &TractId) -> Option<&TierValues> {
        self.rows.get(origin)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_geocode_keeps_leading_zeros() {
        let tract = TractId::from_geocode("014530011001003").unwrap();
        assert_eq!(tract.as_str(), "01453001100");
        assert_eq!(tract.as_str().len(), TRACT_ID_LEN);
    }

    #[test]
    fn test_from_geocode_twelve_character_block_group() {
        let tract = TractId::from_geocode("048453001100").unwrap();
        assert_eq!(tract.as_str(), "04845300110");
    }

    #[test]
    fn test_from_geocode_too_short() {
        let err = TractId::from_geocode("4845300").unwrap_err();
        assert!(matches!(err, AccessError::InvalidGeocode(_)));
    }

    #[test]
    fn test_tier_values_add_and_missing() {
        let mut values = TierValues::zeroed(&[IncomeTier::Total]);
        values.add(IncomeTier::Total, 4.0);
        values.add(IncomeTier::Total, 6.0);
        values.add(IncomeTier::Low, 1.0);

        assert_eq!(values.get(IncomeTier::Total), Some(10.0));
        assert_eq!(values.get(IncomeTier::Low), Some(1.0));
        assert_eq!(values.get(IncomeTier::High), None);
    }

    #[test]
    fn test_tier_labels_are_distinct() {
        let labels: std::collections::HashSet<_> =
            IncomeTier::ALL.iter().map(|t| t.label()).collect();
        assert_eq!(labels.len(), 4);
    }
}
