//! Cross-source reconciliation of response records sharing a session key.
//!
//! This policy is deliberately different from the per-student submission
//! merge: here the secondary source is authoritative for one
//! instrument's field prefix and a non-empty secondary value always
//! wins, with every disagreement kept as an audit conflict.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::model::ids::SessionKey;

/// Which feed a merged record (or a resolved conflict value) came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MergeSource {
    Primary,
    Secondary,
}

/// Unmerged record from either feed. Records without a session key
/// cannot be joined and are dropped (and logged), never matched by
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub session_key: Option<SessionKey>,
    pub fields: BTreeMap<String, String>,
}

/// Disagreement between the two feeds on one restricted-prefix field,
/// kept alongside the resolved value for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub primary_value: String,
    pub secondary_value: String,
    pub resolved_source: MergeSource,
}

/// Canonical record after reconciliation, keyed by session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub session_key: SessionKey,
    pub fields: BTreeMap<String, String>,
    pub sources: BTreeSet<MergeSource>,
    pub conflicts: Vec<FieldConflict>,
}

/// Aggregate counts over a merged output; pure bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub total_records: usize,
    pub with_restricted_fields: usize,
    pub from_primary: usize,
    pub from_secondary: usize,
    pub primary_only: usize,
    pub secondary_only: usize,
    pub both_sources: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Field-name prefix the secondary feed is allowed to touch. Fields
    /// outside it always keep their primary value.
    pub restricted_prefix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            restricted_prefix: "ERV_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataMerger {
    config: MergeConfig,
}

impl DataMerger {
    #[must_use]
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Unions the two feeds into canonical records keyed by session key.
    ///
    /// Primary records form the base set, in input order. A secondary
    /// record with a known key contributes only restricted-prefix
    /// fields: a non-empty secondary value overwrites, and a conflict is
    /// recorded whenever both sides held differing non-empty trimmed
    /// values. A secondary record with an unknown key is appended as a
    /// secondary-only record. Output order is deterministic: primary
    /// input order, then new secondary records in input order.
    #[must_use]
    pub fn merge(&self, primary: &[RawResponse], secondary: &[RawResponse]) -> Vec<MergedRecord> {
        let mut order: Vec<SessionKey> = Vec::with_capacity(primary.len());
        let mut merged: HashMap<SessionKey, MergedRecord> = HashMap::with_capacity(primary.len());

        for record in primary {
            let Some(key) = &record.session_key else {
                warn!(source = "primary", "dropping record without session key");
                continue;
            };
            match merged.get_mut(key) {
                Some(existing) => {
                    // Duplicate primary key: later record extends the base.
                    for (field, value) in &record.fields {
                        existing.fields.insert(field.clone(), value.clone());
                    }
                }
                None => {
                    order.push(key.clone());
                    merged.insert(
                        key.clone(),
                        MergedRecord {
                            session_key: key.clone(),
                            fields: record.fields.clone(),
                            sources: BTreeSet::from([MergeSource::Primary]),
                            conflicts: Vec::new(),
                        },
                    );
                }
            }
        }

        // Conflicts are always judged against the primary values as they
        // stood before any secondary overwrite, so a second secondary
        // record for the same key cannot misattribute an earlier
        // secondary value to the primary side.
        let mut baselines: HashMap<SessionKey, BTreeMap<String, String>> = HashMap::new();
        for record in secondary {
            let Some(key) = &record.session_key else {
                warn!(source = "secondary", "dropping record without session key");
                continue;
            };
            if let Some(existing) = merged.get_mut(key) {
                let baseline = baselines
                    .entry(key.clone())
                    .or_insert_with(|| existing.fields.clone());
                self.merge_restricted(existing, record, baseline);
            } else {
                order.push(key.clone());
                merged.insert(
                    key.clone(),
                    MergedRecord {
                        session_key: key.clone(),
                        fields: record.fields.clone(),
                        sources: BTreeSet::from([MergeSource::Secondary]),
                        conflicts: Vec::new(),
                    },
                );
            }
        }

        order
            .into_iter()
            .filter_map(|key| merged.remove(&key))
            .collect()
    }

    fn merge_restricted(
        &self,
        existing: &mut MergedRecord,
        secondary: &RawResponse,
        baseline: &BTreeMap<String, String>,
    ) {
        let had_primary = existing.sources.contains(&MergeSource::Primary);
        existing.sources.insert(MergeSource::Secondary);

        for (field, value) in &secondary.fields {
            if !field.starts_with(&self.config.restricted_prefix) {
                continue;
            }
            let incoming = value.trim();
            if incoming.is_empty() {
                continue;
            }
            if had_primary {
                if let Some(current) = baseline.get(field) {
                    let held = current.trim();
                    if !held.is_empty() && held != incoming {
                        debug!(
                            session_key = %existing.session_key,
                            field,
                            "secondary value overrides conflicting primary value"
                        );
                        existing.conflicts.push(FieldConflict {
                            field: field.clone(),
                            primary_value: current.clone(),
                            secondary_value: value.clone(),
                            resolved_source: MergeSource::Secondary,
                        });
                    }
                }
            }
            existing.fields.insert(field.clone(), value.clone());
        }
    }

    /// Counts over a merged output. Pure; no side effects.
    #[must_use]
    pub fn validate(&self, merged: &[MergedRecord]) -> MergeStats {
        let mut stats = MergeStats {
            total_records: merged.len(),
            ..MergeStats::default()
        };
        for record in merged {
            let primary = record.sources.contains(&MergeSource::Primary);
            let secondary = record.sources.contains(&MergeSource::Secondary);
            if primary {
                stats.from_primary += 1;
            }
            if secondary {
                stats.from_secondary += 1;
            }
            match (primary, secondary) {
                (true, false) => stats.primary_only += 1,
                (false, true) => stats.secondary_only += 1,
                (true, true) => stats.both_sources += 1,
                (false, false) => {}
            }
            if record
                .fields
                .keys()
                .any(|field| field.starts_with(&self.config.restricted_prefix))
            {
                stats.with_restricted_fields += 1;
            }
            stats.conflicts += record.conflicts.len();
        }
        stats
    }
}
