//! Append-only evidence ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::finding::Finding;
use crate::tools::{InvocationOutcome, ToolCategory, ToolInvocationRecord};

const EVIDENCE_PREVIEW_CHARS: usize = 80;

/// Ordered history of tool invocations for one session.
///
/// There is no way to remove or edit a record; corrections are new records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceLedger {
    records: Vec<ToolInvocationRecord>,
}

impl EvidenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, stamping its ordinal with its 1-based position.
    pub fn append(&mut self, mut record: ToolInvocationRecord) -> &ToolInvocationRecord {
        record.ordinal = self.records.len() + 1;
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[ToolInvocationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ToolInvocationRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tool names in call order, repeats included.
    pub fn tool_sequence(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.tool_name.as_str()).collect()
    }

    /// Distinct tool names in order of first use.
    pub fn tools_used(&self) -> Vec<String> {
        let mut used: Vec<String> = Vec::new();
        for record in &self.records {
            if !used.iter().any(|name| name == &record.tool_name) {
                used.push(record.tool_name.clone());
            }
        }
        used
    }

    /// How many calls each tool category has received.
    pub fn category_counts(&self) -> BTreeMap<ToolCategory, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.category).or_insert(0) += 1;
        }
        counts
    }

    /// Every derived finding with the ordinal of the record that produced it.
    pub fn findings(&self) -> impl Iterator<Item = (usize, &Finding)> + '_ {
        self.records
            .iter()
            .flat_map(|record| record.findings.iter().map(move |f| (record.ordinal, f)))
    }

    pub fn finding_count(&self) -> usize {
        self.records.iter().map(|r| r.findings.len()).sum()
    }

    /// Compact most-recent-first digest for decision policies.
    ///
    /// At most `max_entries` records are described and the text never exceeds
    /// `max_chars`; older records that do not fit are counted in a trailer.
    pub fn summarize(&self, max_entries: usize, max_chars: usize) -> String {
        let header = format!(
            "{} tool call(s), {} finding(s) so far",
            self.records.len(),
            self.finding_count()
        );
        let mut summary = truncate_chars(&header, max_chars);
        let mut described = 0;

        for record in self.records.iter().rev().take(max_entries) {
            let line = describe(record);
            if summary.chars().count() + 1 + line.chars().count() > max_chars {
                break;
            }
            summary.push('\n');
            summary.push_str(&line);
            described += 1;
        }

        let omitted = self.records.len() - described;
        if omitted > 0 {
            let trailer = format!("\n... {omitted} earlier call(s) omitted");
            if summary.chars().count() + trailer.chars().count() <= max_chars {
                summary.push_str(&trailer);
            }
        }
        summary
    }
}

fn describe(record: &ToolInvocationRecord) -> String {
    let head = format!("#{} {} [{}]", record.ordinal, record.tool_name, record.category);
    match &record.outcome {
        InvocationOutcome::Failed { error } => format!("{head} failed: {error}"),
        InvocationOutcome::Success { .. } if record.findings.is_empty() => {
            format!("{head} ok: no findings")
        }
        InvocationOutcome::Success { .. } => {
            let findings = record
                .findings
                .iter()
                .map(|f| {
                    format!(
                        "{}/{} \"{}\"",
                        f.category,
                        f.severity,
                        truncate_chars(&f.evidence, EVIDENCE_PREVIEW_CHARS)
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            format!("{head} ok: {findings}")
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
