//! Conditional name-to-link resolution.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One entry of the host's link table.
///
/// `ifdef` holds when at least one listed define is active, `ifndef` when none is.
/// A record without either constraint matches on name alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub name: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifdef: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifndef: Option<Vec<String>>,
}

impl LinkRecord {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
            ifdef: None,
            ifndef: None,
        }
    }

    pub fn with_ifdef(mut self, defines: &[&str]) -> Self {
        self.ifdef = Some(defines.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_ifndef(mut self, defines: &[&str]) -> Self {
        self.ifndef = Some(defines.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn condition_holds(&self, defines: &BTreeSet<String>) -> bool {
        let ifdef_ok = self
            .ifdef
            .as_ref()
            .is_none_or(|ds| ds.iter().any(|d| defines.contains(d)));
        let ifndef_ok = self
            .ifndef
            .as_ref()
            .is_none_or(|ds| !ds.iter().any(|d| defines.contains(d)));
        ifdef_ok && ifndef_ok
    }
}

/// Ordered link table. Scanned linearly so a later, more specific record can
/// take over when an earlier one's condition fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkTable {
    records: Vec<LinkRecord>,
}

impl LinkTable {
    pub fn new(records: Vec<LinkRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: LinkRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkRecord> {
        self.records.iter()
    }

    /// First record whose name matches and whose condition holds.
    pub fn resolve(&self, name: &str, defines: &BTreeSet<String>) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.name == name && r.condition_holds(defines))
            .map(|r| r.link.as_str())
    }
}
