/*!
 * Schema definitions for claims input tables
 *
 * Column names are configuration rather than constants: `ColumnMapping`
 * names the header used for each logical field, and each table schema
 * resolves those names against a CSV header row.
 */

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::data_types::dx_slot_index;
use crate::{ClaimsError, Result};

/// Header names for each logical field of the three input tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub claim_id: String,
    pub member_id: String,
    pub service_from_date: String,
    pub paid_amount: String,
    pub fill_date: String,
    pub days_supply: String,
    pub effective_date: String,
    pub termination_date: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            claim_id: "claim_id".to_string(),
            member_id: "member_id".to_string(),
            service_from_date: "service_from_date".to_string(),
            paid_amount: "paid_amount".to_string(),
            fill_date: "fill_date".to_string(),
            days_supply: "days_supply".to_string(),
            effective_date: "eff_date".to_string(),
            termination_date: "term_date".to_string(),
        }
    }
}

/// Position of every header in a CSV file
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
    headers: Vec<String>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let positions = headers.iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Self {
            positions,
            headers: headers.iter().map(|h| h.trim().to_string()).collect(),
        }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Position of a required column, or a missing-column error naming it
    pub fn require(&self, column: &str, table: &str) -> Result<usize> {
        self.position(column)
            .ok_or_else(|| ClaimsError::missing_column(column, table))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

/// Resolved column positions for the medical claims table
#[derive(Debug, Clone)]
pub struct MedicalClaimSchema {
    pub claim_id: usize,
    pub member_id: usize,
    pub service_from_date: usize,
    pub paid_amount: usize,
    /// (slot index, column position) for each `dxN` header present
    pub dx_slots: Vec<(usize, usize)>,
    /// (name, column position) for all remaining headers
    pub attributes: Vec<(String, usize)>,
}

impl MedicalClaimSchema {
    pub const TABLE: &'static str = "medical claims";

    pub fn resolve(headers: &[String], mapping: &ColumnMapping) -> Result<Self> {
        let index = HeaderIndex::new(headers);
        let claim_id = index.require(&mapping.claim_id, Self::TABLE)?;
        let member_id = index.require(&mapping.member_id, Self::TABLE)?;
        let service_from_date = index.require(&mapping.service_from_date, Self::TABLE)?;
        let paid_amount = index.require(&mapping.paid_amount, Self::TABLE)?;
        let fixed = [claim_id, member_id, service_from_date, paid_amount];

        let mut dx_slots = Vec::new();
        let mut attributes = Vec::new();
        for (pos, name) in index.headers().iter().enumerate() {
            if fixed.contains(&pos) {
                continue;
            }
            match dx_slot_index(name) {
                Some(slot) => dx_slots.push((slot, pos)),
                None => attributes.push((name.clone(), pos)),
            }
        }

        Ok(Self {
            claim_id,
            member_id,
            service_from_date,
            paid_amount,
            dx_slots,
            attributes,
        })
    }
}

/// Resolved column positions for the pharmacy fills table
#[derive(Debug, Clone)]
pub struct PharmacyFillSchema {
    pub member_id: usize,
    pub fill_date: usize,
    pub days_supply: usize,
    /// (code column label, column position) for all remaining headers
    pub code_columns: Vec<(String, usize)>,
}

impl PharmacyFillSchema {
    pub const TABLE: &'static str = "pharmacy fills";

    pub fn resolve(headers: &[String], mapping: &ColumnMapping) -> Result<Self> {
        let index = HeaderIndex::new(headers);
        let member_id = index.require(&mapping.member_id, Self::TABLE)?;
        let fill_date = index.require(&mapping.fill_date, Self::TABLE)?;
        let days_supply = index.require(&mapping.days_supply, Self::TABLE)?;
        let fixed = [member_id, fill_date, days_supply];

        let code_columns = index.headers().iter()
            .enumerate()
            .filter(|(pos, _)| !fixed.contains(pos))
            .map(|(pos, name)| (name.clone(), pos))
            .collect();

        Ok(Self {
            member_id,
            fill_date,
            days_supply,
            code_columns,
        })
    }
}

/// Resolved column positions for the eligibility table
#[derive(Debug, Clone)]
pub struct EligibilitySchema {
    pub member_id: usize,
    pub effective_date: usize,
    pub termination_date: usize,
}

impl EligibilitySchema {
    pub const TABLE: &'static str = "eligibility";

    pub fn resolve(headers: &[String], mapping: &ColumnMapping) -> Result<Self> {
        let index = HeaderIndex::new(headers);
        Ok(Self {
            member_id: index.require(&mapping.member_id, Self::TABLE)?,
            effective_date: index.require(&mapping.effective_date, Self::TABLE)?,
            termination_date: index.require(&mapping.termination_date, Self::TABLE)?,
        })
    }
}
