// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! The authenticated state index (component B): a fixed-depth, perfect
//! binary Merkle tree over account states, with proof generation, proof
//! caching, and bounded parallel proof verification.

use aptos_in_memory_cache::{CacheLevel, Eviction};
use bounded_executor::BoundedExecutor;
use sequencer_types::{Hash256, MerkleNode, MerkleProof};
use std::collections::HashMap;
use thiserror::Error;

const PROOF_CACHE_CAPACITY: usize = 4_096;

/// Default maximum tree depth (§4.B): every proof carries exactly this many
/// sibling entries, regardless of how many leaves have actually been added.
pub const DEFAULT_DEPTH: u32 = 32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MerkleError {
    #[error("leaf index {0} is out of range")]
    OutOfRange(usize),
}

/// A perfect binary tree of fixed maximum depth `D`. Leaves are addressed by
/// insertion index; a leaf slot that has never been written defaults to a
/// precomputed "empty subtree" hash for its height, so every proof — whether
/// for a populated leaf or not — has exactly `D` sibling entries. Interior
/// nodes are memoized in `nodes`, keyed by (height, index); a mutation at
/// leaf `i` recomputes only the `D` ancestors on `i`'s path, leaving every
/// other subtree's cached hash untouched.
pub struct MerkleTree {
    depth: u32,
    next_index: u64,
    nodes: HashMap<(u32, u64), Hash256>,
    empty_hashes: Vec<Hash256>,
    generation: u64,
    proof_cache: CacheLevel<(u64, usize), MerkleProof>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_DEPTH)
    }

    /// Builds a tree with a depth other than the default. Production code
    /// should use [`Self::new`]; a smaller depth is convenient for tests and
    /// for scenarios, like §8's four-leaf example, that are specified over a
    /// shallow tree.
    pub fn with_depth(depth: u32) -> Self {
        MerkleTree {
            depth,
            next_index: 0,
            nodes: HashMap::new(),
            empty_hashes: empty_subtree_hashes(depth),
            generation: 0,
            proof_cache: CacheLevel::new(PROOF_CACHE_CAPACITY, Eviction::Lru),
        }
    }

    pub fn len(&self) -> usize {
        self.next_index as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn node(&self, height: u32, index: u64) -> Hash256 {
        self.nodes
            .get(&(height, index))
            .copied()
            .unwrap_or(self.empty_hashes[height as usize])
    }

    /// Appends `leaf` at the next free index and returns that index.
    pub fn add_leaf(&mut self, leaf: Hash256) -> usize {
        let index = self.next_index as usize;
        self.next_index += 1;
        self.batch_update(&[(index, leaf)])
            .expect("just-reserved index is always in range");
        index
    }

    /// Overwrites the leaf at `index` in place and recomputes its `D`
    /// ancestors. `index` must already have been produced by [`Self::add_leaf`].
    pub fn update_leaf(&mut self, index: usize, leaf: Hash256) -> Result<(), MerkleError> {
        self.batch_update(&[(index, leaf)])
    }

    /// Applies every update in `updates`, recomputing each affected interior
    /// node exactly once. Updates that share an ancestor have both leaf
    /// mutations applied before that ancestor is hashed, per §4.B's
    /// tie-break rule.
    pub fn batch_update(&mut self, updates: &[(usize, Hash256)]) -> Result<(), MerkleError> {
        if updates.is_empty() {
            return Ok(());
        }
        let capacity = 1u64 << self.depth;
        let mut dirty: Vec<u64> = Vec::with_capacity(updates.len());
        for &(index, leaf) in updates {
            let index = index as u64;
            if index >= capacity || index >= self.next_index {
                return Err(MerkleError::OutOfRange(index as usize));
            }
            self.nodes.insert((0, index), leaf);
            dirty.push(index);
        }
        dirty.sort_unstable();
        dirty.dedup();

        for height in 0..self.depth {
            let mut parents: Vec<u64> = dirty.iter().map(|i| i / 2).collect();
            parents.sort_unstable();
            parents.dedup();
            for &parent in &parents {
                let left = self.node(height, parent * 2);
                let right = self.node(height, parent * 2 + 1);
                self.nodes.insert((height + 1, parent), Hash256::combine(&left, &right));
            }
            dirty = parents;
        }

        self.generation += 1;
        Ok(())
    }

    pub fn root(&self) -> Hash256 {
        self.node(self.depth, 0)
    }

    /// Builds an inclusion proof for the leaf at `index`, or `None` if
    /// `index` has never been written. Proofs are cached keyed by the tree's
    /// generation, so repeated lookups against an unchanged tree do not
    /// re-walk the path.
    pub fn prove(&self, index: usize) -> Option<MerkleProof> {
        if index as u64 >= self.next_index {
            return None;
        }
        let cache_key = (self.generation, index);
        if let Some(cached) = self.proof_cache.get(&cache_key) {
            return Some(cached);
        }

        let leaf = self.node(0, index as u64);
        let root = self.root();
        let mut siblings = Vec::with_capacity(self.depth as usize);
        let mut pos = index as u64;
        for height in 0..self.depth {
            let sibling_pos = pos ^ 1;
            let sibling_hash = self.node(height, sibling_pos);
            let node = if pos % 2 == 0 {
                MerkleNode::Right(sibling_hash)
            } else {
                MerkleNode::Left(sibling_hash)
            };
            siblings.push(node);
            pos /= 2;
        }

        let proof = MerkleProof::new(leaf, siblings, root);
        self.proof_cache.set(cache_key, proof.clone(), None);
        Some(proof)
    }

    /// Recomputes `proof`'s root from its leaf and siblings and compares it
    /// against `expected_root`, independent of any tree state. Used to check
    /// proofs this tree did not itself just build, e.g. ones received from a
    /// peer or bundled into a settlement submission.
    pub fn verify(proof: &MerkleProof, expected_root: &Hash256) -> bool {
        proof.verify_against(expected_root)
    }

    /// Clears every leaf and interior node, returning the tree to its
    /// just-constructed state at the same depth.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.next_index = 0;
        self.generation += 1;
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MerkleTree {
    /// Clones the tree's nodes but not its proof cache, which is rebuilt
    /// lazily. Used when a component needs a scratch copy of the state index
    /// to speculate against without disturbing the original.
    fn clone(&self) -> Self {
        MerkleTree {
            depth: self.depth,
            next_index: self.next_index,
            nodes: self.nodes.clone(),
            empty_hashes: self.empty_hashes.clone(),
            generation: self.generation,
            proof_cache: CacheLevel::new(PROOF_CACHE_CAPACITY, Eviction::Lru),
        }
    }
}

fn empty_subtree_hashes(depth: u32) -> Vec<Hash256> {
    let mut hashes = Vec::with_capacity(depth as usize + 1);
    hashes.push(Hash256::ZERO);
    for h in 1..=depth {
        let prev = hashes[h as usize - 1];
        hashes.push(Hash256::combine(&prev, &prev));
    }
    hashes
}

/// Verifies every proof in `proofs` concurrently, capped at the executor's
/// configured concurrency, and returns results in the same order they were
/// given. Used when a settlement batch arrives with a bundle of inclusion
/// proofs that all need checking before the batch is accepted.
pub async fn verify_many(executor: &BoundedExecutor, proofs: Vec<MerkleProof>) -> Vec<bool> {
    let handles: Vec<_> = proofs
        .into_iter()
        .map(|proof| executor.spawn(async move { proof.verify() }))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let joined = handle.await;
        results.push(joined.unwrap_or(false));
    }
    results
}
