// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::hash::Hash256;
use serde::{Deserialize, Serialize};

/// One node of the authenticated state index, as carried in a proof: its own
/// hash and which side of its parent it occupies. `sequencer-merkle` is the
/// only component that builds or verifies these; this crate just defines the
/// shape so proofs can cross component boundaries (e.g. into
/// `sequencer-adapters` for settlement submission) without a dependency on
/// the tree implementation itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleNode {
    Left(Hash256),
    Right(Hash256),
}

impl MerkleNode {
    pub fn hash(&self) -> Hash256 {
        match self {
            MerkleNode::Left(h) | MerkleNode::Right(h) => *h,
        }
    }
}

/// An inclusion proof for a single leaf: the leaf's own hash, the sibling
/// path from the leaf up to the root, and the root the proof should
/// reconstruct to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Hash256,
    pub siblings: Vec<MerkleNode>,
    pub root: Hash256,
}

impl MerkleProof {
    pub fn new(leaf: Hash256, siblings: Vec<MerkleNode>, root: Hash256) -> Self {
        MerkleProof {
            leaf,
            siblings,
            root,
        }
    }

    /// Recomputes the root from `leaf` and `siblings` and compares it to
    /// `root`. Does not touch any tree state; `sequencer-merkle` uses this to
    /// verify proofs it did not itself just build, e.g. ones received from a
    /// peer.
    pub fn verify(&self) -> bool {
        self.reconstructs() == self.root
    }

    /// Recomputes the root from `leaf` and `siblings` and compares it to an
    /// externally supplied `expected_root`, ignoring the proof's own `root`
    /// field. Used when checking a proof against a root obtained from
    /// another source, e.g. the root last observed on L1, rather than
    /// trusting the root bundled into the proof itself.
    pub fn verify_against(&self, expected_root: &Hash256) -> bool {
        self.reconstructs() == *expected_root
    }

    fn reconstructs(&self) -> Hash256 {
        let mut current = self.leaf;
        for sibling in &self.siblings {
            current = match sibling {
                MerkleNode::Left(h) => Hash256::combine(h, &current),
                MerkleNode::Right(h) => Hash256::combine(&current, h),
            };
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_over_two_leaves_verifies() {
        let leaf_a = Hash256::hash_bytes(b"a");
        let leaf_b = Hash256::hash_bytes(b"b");
        let root = Hash256::combine(&leaf_a, &leaf_b);

        let proof_a = MerkleProof::new(leaf_a, vec![MerkleNode::Right(leaf_b)], root);
        assert!(proof_a.verify());

        let proof_b = MerkleProof::new(leaf_b, vec![MerkleNode::Left(leaf_a)], root);
        assert!(proof_b.verify());
    }

    #[test]
    fn verify_against_ignores_the_proofs_own_root_field() {
        let leaf_a = Hash256::hash_bytes(b"a");
        let leaf_b = Hash256::hash_bytes(b"b");
        let root = Hash256::combine(&leaf_a, &leaf_b);
        let proof = MerkleProof::new(leaf_a, vec![MerkleNode::Right(leaf_b)], Hash256::ZERO);

        assert!(!proof.verify());
        assert!(proof.verify_against(&root));
        assert!(!proof.verify_against(&Hash256::ZERO.clone()));
    }

    #[test]
    fn tampered_root_fails_verification() {
        let leaf_a = Hash256::hash_bytes(b"a");
        let leaf_b = Hash256::hash_bytes(b"b");
        let wrong_root = Hash256::hash_bytes(b"wrong");
        let proof = MerkleProof::new(leaf_a, vec![MerkleNode::Right(leaf_b)], wrong_root);
        assert!(!proof.verify());
    }
}
