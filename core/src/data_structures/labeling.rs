//! Per-node label states shared by the certification and fallback stages
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{EnergyError, LabelIndex, NodeIndex};

/// Label state of one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// No label yet
    #[default]
    Unassigned,
    /// Provably optimal label
    Certified(LabelIndex),
    /// Label chosen by an approximate solver
    Tentative(LabelIndex),
}

/// Labeling over original node indices
///
/// Certified entries are write-once: a second certification with a
/// different label and any tentative overwrite of a certified entry are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labeling {
    states: Vec<NodeState>,
}

impl Labeling {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            states: vec![NodeState::Unassigned; num_nodes],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn state(&self, node: NodeIndex) -> NodeState {
        self.states[node]
    }

    pub fn states(&self) -> &[NodeState] {
        &self.states
    }

    /// Certified label of `node`, if any
    #[inline]
    pub fn certified(&self, node: NodeIndex) -> Option<LabelIndex> {
        match self.states[node] {
            NodeState::Certified(label) => Some(label),
            _ => None,
        }
    }

    /// Certified or tentative label of `node`
    #[inline]
    pub fn label(&self, node: NodeIndex) -> Option<LabelIndex> {
        match self.states[node] {
            NodeState::Certified(label) | NodeState::Tentative(label) => Some(label),
            NodeState::Unassigned => None,
        }
    }

    /// Marks `node` as certified for `label`
    ///
    /// Returns `Ok(true)` when the node was not certified before.
    pub fn certify(&mut self, node: NodeIndex, label: LabelIndex) -> Result<bool, EnergyError> {
        match self.states[node] {
            NodeState::Certified(existing) if existing == label => Ok(false),
            NodeState::Certified(existing) => Err(EnergyError::InconsistentCertification {
                node,
                existing,
                attempted: label,
            }),
            _ => {
                self.states[node] = NodeState::Certified(label);
                Ok(true)
            }
        }
    }

    /// Records an approximate label for an uncertified node
    pub fn assign_tentative(
        &mut self,
        node: NodeIndex,
        label: LabelIndex,
    ) -> Result<(), EnergyError> {
        match self.states[node] {
            NodeState::Certified(existing) if existing != label => {
                Err(EnergyError::InconsistentCertification {
                    node,
                    existing,
                    attempted: label,
                })
            }
            NodeState::Certified(_) => Ok(()),
            _ => {
                self.states[node] = NodeState::Tentative(label);
                Ok(())
            }
        }
    }

    pub fn certified_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, NodeState::Certified(_)))
            .count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, NodeState::Unassigned))
            .count()
    }

    /// Nodes currently certified, in index order
    pub fn certified_nodes(&self) -> impl Iterator<Item = (NodeIndex, LabelIndex)> + '_ {
        self.states.iter().enumerate().filter_map(|(node, s)| match s {
            NodeState::Certified(label) => Some((node, *label)),
            _ => None,
        })
    }

    /// Concrete label per node, or `IncompleteLabeling`
    pub fn complete(&self) -> Result<Vec<LabelIndex>, EnergyError> {
        let unresolved = self.unresolved_count();
        if unresolved > 0 {
            return Err(EnergyError::IncompleteLabeling { unresolved });
        }
        Ok(self
            .states
            .iter()
            .filter_map(|s| match s {
                NodeState::Certified(label) | NodeState::Tentative(label) => Some(*label),
                NodeState::Unassigned => None,
            })
            .collect())
    }
}
