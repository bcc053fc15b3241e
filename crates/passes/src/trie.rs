//! The call-stack trie.
//!
//! All allocation contexts matched to one call instruction merge into one
//! trie, keyed by frame StackId and descending leaf-to-caller. Building the
//! metadata collapses every subtree whose contexts agree in classification
//! to its shortest discriminating prefix; only disagreements keep full
//! depth.

use std::collections::BTreeMap;

use memheat_ir::{ContextTotalSize, MibEntry};
use memheat_profile::AllocationType;

const ALLOC_TYPES: [AllocationType; 4] = [
    AllocationType::None,
    AllocationType::NotCold,
    AllocationType::Cold,
    AllocationType::Hot,
];

fn has_single_alloc_type(types: u8) -> bool {
    types.count_ones() == 1
}

fn type_from_bits(types: u8) -> AllocationType {
    debug_assert!(has_single_alloc_type(types));
    ALLOC_TYPES
        .into_iter()
        .find(|ty| ty.as_bit() == types)
        .expect("a single known alloc type bit")
}

#[derive(Debug)]
struct TrieNode {
    /// Set of [`AllocationType`] bits seen anywhere in this subtree.
    alloc_types: u8,
    /// Types of the contexts whose outermost frame is this node.
    ended_types: u8,
    /// Children keyed by caller-side StackId; BTreeMap for deterministic
    /// metadata order.
    callers: BTreeMap<u64, usize>,
    /// Sizes of the contexts ending at this node, tagged with their type.
    context_sizes: Vec<(AllocationType, ContextTotalSize)>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            alloc_types: 0,
            ended_types: 0,
            callers: BTreeMap::new(),
            context_sizes: Vec::new(),
        }
    }
}

/// One trie corresponds to exactly one call instruction; contexts merge by
/// their longest common leaf-ward prefix.
pub struct CallStackTrie {
    nodes: Vec<TrieNode>,
    /// Index of the root (allocation leaf) node, once any context is added.
    alloc: Option<usize>,
    alloc_stack_id: u64,
}

impl CallStackTrie {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            alloc: None,
            alloc_stack_id: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alloc.is_none()
    }

    /// Adds one matched context, leaf-first. Re-adding an identical context
    /// merges: type bits are OR'd and a context size already recorded for
    /// the same full-stack id is not counted again.
    pub fn add_call_stack(
        &mut self,
        alloc_type: AllocationType,
        stack_ids: &[u64],
        context_sizes: Vec<ContextTotalSize>,
    ) {
        debug_assert!(!stack_ids.is_empty());

        let root = match self.alloc {
            Some(root) => {
                // One trie per call instruction: every context shares the
                // instruction's leaf frame.
                debug_assert_eq!(self.alloc_stack_id, stack_ids[0]);
                root
            }
            None => {
                self.alloc_stack_id = stack_ids[0];
                self.nodes.push(TrieNode::new());
                self.alloc = Some(0);
                0
            }
        };

        let bit = alloc_type.as_bit();
        self.nodes[root].alloc_types |= bit;

        let mut current = root;
        for &stack_id in &stack_ids[1..] {
            let next = match self.nodes[current].callers.get(&stack_id) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::new());
                    self.nodes[current].callers.insert(stack_id, next);
                    next
                }
            };
            self.nodes[next].alloc_types |= bit;
            current = next;
        }

        let node = &mut self.nodes[current];
        node.ended_types |= bit;
        for size in context_sizes {
            let seen = node
                .context_sizes
                .iter()
                .any(|(_, existing)| existing.full_stack_id == size.full_stack_id);
            if !seen {
                node.context_sizes.push((alloc_type, size));
            }
        }
    }

    /// Collapses the trie into attachable metadata, or `None` when empty.
    pub fn build_metadata(&self) -> Option<TrieOutcome> {
        let root = self.alloc?;
        let root_node = &self.nodes[root];

        if has_single_alloc_type(root_node.alloc_types) {
            let alloc_type = type_from_bits(root_node.alloc_types);
            let mut context_sizes = Vec::new();
            self.collect_subtree_sizes(root, &mut context_sizes);
            if context_sizes.is_empty() {
                return Some(TrieOutcome::SingleType(alloc_type));
            }
            // Recorded sizes must survive, so even a uniform trie keeps one
            // structured entry instead of a bare attribute.
            return Some(TrieOutcome::Contexts(vec![MibEntry {
                stack_ids: vec![self.alloc_stack_id],
                alloc_type: alloc_type.as_attr_str(),
                context_sizes,
            }]));
        }

        let mut entries = Vec::new();
        let mut prefix = vec![self.alloc_stack_id];
        self.build_nodes(root, &mut prefix, &mut entries);
        Some(TrieOutcome::Contexts(entries))
    }

    fn build_nodes(&self, node_idx: usize, prefix: &mut Vec<u64>, out: &mut Vec<MibEntry>) {
        let node = &self.nodes[node_idx];

        if has_single_alloc_type(node.alloc_types) {
            let alloc_type = type_from_bits(node.alloc_types);
            let mut context_sizes = Vec::new();
            self.collect_subtree_sizes(node_idx, &mut context_sizes);
            out.push(MibEntry {
                stack_ids: prefix.clone(),
                alloc_type: alloc_type.as_attr_str(),
                context_sizes,
            });
            return;
        }

        // Mixed classifications below this prefix. Contexts ending exactly
        // here get their own entries; longer contexts discriminate further
        // down.
        for ty in ALLOC_TYPES {
            if node.ended_types & ty.as_bit() == 0 {
                continue;
            }
            let context_sizes = node
                .context_sizes
                .iter()
                .filter(|(size_ty, _)| *size_ty == ty)
                .map(|(_, size)| *size)
                .collect();
            out.push(MibEntry {
                stack_ids: prefix.clone(),
                alloc_type: ty.as_attr_str(),
                context_sizes,
            });
        }

        for (&stack_id, &child) in &node.callers {
            prefix.push(stack_id);
            self.build_nodes(child, prefix, out);
            prefix.pop();
        }
    }

    fn collect_subtree_sizes(&self, node_idx: usize, out: &mut Vec<ContextTotalSize>) {
        let node = &self.nodes[node_idx];
        out.extend(node.context_sizes.iter().map(|(_, size)| *size));
        for &child in node.callers.values() {
            self.collect_subtree_sizes(child, out);
        }
    }
}

impl Default for CallStackTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finalized trie turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrieOutcome {
    /// All contexts agree; a single attribute suffices.
    SingleType(AllocationType),
    /// Contexts disagree; structured per-context metadata is required.
    Contexts(Vec<MibEntry>),
}
