use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::finding::{Finding, FindingCategory};
use crate::ledger::EvidenceLedger;

/// A deduplicated finding with its position in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub finding: Finding,
    pub digest: String,
    /// Ordinal of the ledger record where this finding first appeared.
    pub first_seen: usize,
    /// Set when another tool reported the same category and evidence; names
    /// the tool whose record carries the severity in scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corroborates: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corroborated_by: Vec<String>,
}

impl VulnerabilityRecord {
    /// Whether this record counts toward the risk score.
    pub fn is_primary(&self) -> bool {
        self.corroborates.is_none()
    }
}

/// Merges findings from every executed tool into ranked vulnerability
/// records.
#[derive(Debug, Default, Clone, Copy)]
pub struct FindingAggregator;

impl FindingAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, ledger: &EvidenceLedger) -> Vec<VulnerabilityRecord> {
        self.aggregate_findings(ledger.findings())
    }

    /// Aggregate an already aggregated set again; yields the same set.
    pub fn reaggregate(&self, records: &[VulnerabilityRecord]) -> Vec<VulnerabilityRecord> {
        self.aggregate_findings(records.iter().map(|r| (r.first_seen, &r.finding)))
    }

    /// Aggregate `(ordinal, finding)` pairs.
    ///
    /// Findings with the same category, tool and evidence digest collapse into
    /// one record. Findings sharing category and digest across tools are all
    /// kept, but only one of them is primary; the rest point at it through
    /// `corroborates`.
    pub fn aggregate_findings<'a, I>(&self, findings: I) -> Vec<VulnerabilityRecord>
    where
        I: IntoIterator<Item = (usize, &'a Finding)>,
    {
        let mut unique: BTreeMap<(FindingCategory, String, String), VulnerabilityRecord> =
            BTreeMap::new();

        for (ordinal, finding) in findings {
            let digest = finding.digest();
            let key = (finding.category, finding.source_tool.clone(), digest.clone());
            match unique.get_mut(&key) {
                Some(existing) => {
                    if finding.severity > existing.finding.severity {
                        existing.finding = finding.clone();
                    }
                    existing.first_seen = existing.first_seen.min(ordinal);
                }
                None => {
                    unique.insert(
                        key,
                        VulnerabilityRecord {
                            finding: finding.clone(),
                            digest,
                            first_seen: ordinal,
                            corroborates: None,
                            corroborated_by: Vec::new(),
                        },
                    );
                }
            }
        }

        let mut groups: BTreeMap<(FindingCategory, String), Vec<VulnerabilityRecord>> =
            BTreeMap::new();
        for ((category, _, digest), record) in unique {
            groups.entry((category, digest)).or_default().push(record);
        }

        let mut records = Vec::new();
        for (_, mut group) in groups {
            if group.len() > 1 {
                mark_corroboration(&mut group);
            } else if let Some(record) = group.first_mut() {
                record.corroborates = None;
                record.corroborated_by.clear();
            }
            records.extend(group);
        }

        records.sort_by(|a, b| {
            b.finding
                .severity
                .cmp(&a.finding.severity)
                .then(a.first_seen.cmp(&b.first_seen))
                .then(a.finding.category.cmp(&b.finding.category))
                .then(a.finding.source_tool.cmp(&b.finding.source_tool))
                .then(a.digest.cmp(&b.digest))
        });
        records
    }
}

/// Pick the primary record of a cross-tool group: highest severity, then
/// earliest appearance, then tool name.
fn mark_corroboration(group: &mut [VulnerabilityRecord]) {
    group.sort_by_key(|r| {
        (
            Reverse(r.finding.severity),
            r.first_seen,
            r.finding.source_tool.clone(),
        )
    });
    let primary_tool = group[0].finding.source_tool.clone();
    let mut others: Vec<String> = group[1..]
        .iter()
        .map(|r| r.finding.source_tool.clone())
        .collect();
    others.sort();

    group[0].corroborates = None;
    group[0].corroborated_by = others;
    for record in &mut group[1..] {
        record.corroborates = Some(primary_tool.clone());
        record.corroborated_by.clear();
    }
}
