//! Wild type → mutant hierarchy used by per-allele reports.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::significance::ClassifiedRecord;

/// Root of the allele index. Serializes as `{"name": "genes", "children": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlleleIndexTree {
    pub name: String,
    pub children: Vec<WildTypeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildTypeNode {
    pub name: String,
    pub children: Vec<MutantNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutantNode {
    pub name: String,
    /// `"{wild_type}_{mutant}"`.
    pub pair: String,
    /// Attached result payloads, keyed by the caller's field name.
    #[serde(flatten)]
    pub results: BTreeMap<String, Value>,
}

impl Default for AlleleIndexTree {
    fn default() -> Self {
        Self {
            name: "genes".to_string(),
            children: Vec::new(),
        }
    }
}

impl AlleleIndexTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `mutant` under `wild_type`, creating the wild-type node if needed.
    /// Entries are never removed; re-evaluating a pair appends a second node.
    pub fn record_pair(&mut self, wild_type: &str, mutant: &str) {
        let pos = match self.children.iter().position(|n| n.name == wild_type) {
            Some(pos) => pos,
            None => {
                self.children.push(WildTypeNode {
                    name: wild_type.to_string(),
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        self.children[pos].children.push(MutantNode {
            name: mutant.to_string(),
            pair: format!("{wild_type}_{mutant}"),
            results: BTreeMap::new(),
        });
    }

    pub fn find(&self, wild_type: &str, mutant: &str) -> Option<&MutantNode> {
        self.children
            .iter()
            .find(|n| n.name == wild_type)?
            .children
            .iter()
            .find(|m| m.name == mutant)
    }

    /// Total mutant nodes across all wild types.
    pub fn pair_count(&self) -> usize {
        self.children.iter().map(|n| n.children.len()).sum()
    }

    /// Stable sort of wild types, and of each wild type's mutants, by name.
    pub fn sort(&mut self) {
        for node in &mut self.children {
            node.children.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.children.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Store each classified record under its pair's node as `field`.
    ///
    /// Records whose wild type or mutant is missing from the tree are logged and
    /// skipped. Returns the number of records attached.
    pub fn attach_results(&mut self, classified: &[ClassifiedRecord], field: &str) -> usize {
        let mut attached = 0;
        for entry in classified {
            let wild_type = &entry.record.wild_type;
            let mutant = &entry.record.mutant;
            let Some(wt_node) = self.children.iter_mut().find(|n| &n.name == wild_type) else {
                warn!("{wild_type} missing in index");
                continue;
            };
            let Some(mut_node) = wt_node.children.iter_mut().find(|m| &m.name == mutant) else {
                warn!("{mutant} missing in index");
                continue;
            };
            match serde_json::to_value(entry) {
                Ok(value) => {
                    mut_node.results.insert(field.to_string(), value);
                    attached += 1;
                }
                Err(e) => warn!("could not serialize result for {mutant}: {e}"),
            }
        }
        self.sort();
        attached
    }
}
