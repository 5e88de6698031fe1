//! State tree discovery and selection
//!
//! On public clusters the available state trees are published in an address
//! lookup table as consecutive (tree, queue, cpi context) triples. Trees that
//! have been rolled over are additionally listed in a second, "nullified"
//! table: their accounts can still be spent, but no new outputs go there.

use rand::seq::SliceRandom;
use solana_sdk::{pubkey, pubkey::Pubkey};

use crate::error::EngineError;
use crate::types::{TreeInfo, TreeType};

/// Default state tree of a local test validator
pub const LOCALNET_STATE_TREE: Pubkey = pubkey!("smt1NamzXdq4AMqS2fS2F1i5KTYPZRhoHgWx38d8WsT");
pub const LOCALNET_NULLIFIER_QUEUE: Pubkey = pubkey!("nfq1NvQDJ2GEgnS8zt9prAe8rjjpAW1zFkrvZoBR148");
pub const LOCALNET_CPI_CONTEXT: Pubkey = pubkey!("cpi1uHzrEhBG733DoEJNgHCyRS3XmmyVNZx5fonubE4");

/// Known state trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTrees {
    active: Vec<TreeInfo>,
    retired: Vec<TreeInfo>,
}

impl StateTrees {
    pub fn new(active: Vec<TreeInfo>, retired: Vec<TreeInfo>) -> Self {
        Self { active, retired }
    }

    pub fn localnet() -> Self {
        Self::new(
            vec![TreeInfo {
                tree: LOCALNET_STATE_TREE,
                queue: LOCALNET_NULLIFIER_QUEUE,
                cpi_context: Some(LOCALNET_CPI_CONTEXT),
                tree_type: TreeType::StateV1,
                next_tree_info: None,
            }],
            Vec::new(),
        )
    }

    /// Build from the addresses stored in the lookup tables.
    ///
    /// `table` holds (tree, queue, cpi context) triples; any tree also
    /// present in `nullified` is retired.
    pub fn from_lookup_tables(table: &[Pubkey], nullified: &[Pubkey]) -> Result<Self, EngineError> {
        if table.len() % 3 != 0 {
            return Err(EngineError::Connection(format!(
                "state tree lookup table has {} entries, expected (tree, queue, cpi) triples",
                table.len()
            )));
        }

        let mut trees = StateTrees::default();
        for triple in table.chunks_exact(3) {
            let info = TreeInfo {
                tree: triple[0],
                queue: triple[1],
                cpi_context: Some(triple[2]),
                tree_type: TreeType::StateV1,
                next_tree_info: None,
            };
            if nullified.contains(&info.tree) {
                trees.retired.push(info);
            } else {
                trees.active.push(info);
            }
        }
        Ok(trees)
    }

    pub fn active(&self) -> &[TreeInfo] {
        &self.active
    }

    pub fn retired(&self) -> &[TreeInfo] {
        &self.retired
    }

    /// Look up a tree by address, active or retired
    pub fn find(&self, tree: &Pubkey) -> Option<&TreeInfo> {
        self.active
            .iter()
            .chain(self.retired.iter())
            .find(|info| info.tree == *tree)
    }
}

/// Pick a random active V1 state tree to receive new outputs.
///
/// Spreading writes over trees avoids contention on a single queue.
pub fn select_state_tree(trees: &StateTrees) -> Result<TreeInfo, EngineError> {
    let candidates: Vec<&TreeInfo> = trees
        .active
        .iter()
        .filter(|info| info.tree_type == TreeType::StateV1)
        .collect();

    candidates
        .choose(&mut rand::thread_rng())
        .map(|info| (*info).clone())
        .ok_or(EngineError::NoUsableStateTree)
}
