//! This module contains function layout information including block order and instruction order.

use rustc_hash::FxHashMap;

use crate::{dfg::BlockId, inst::InstId};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    blocks: FxHashMap<BlockId, BlockNode>,
    insts: FxHashMap<InstId, InstNode>,
    first_block: Option<BlockId>,
    last_block: Option<BlockId>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.first_block
    }

    pub fn last_block(&self) -> Option<BlockId> {
        self.last_block
    }

    pub fn is_block_inserted(&self, block: BlockId) -> bool {
        self.blocks.contains_key(&block)
    }

    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.first_inst_of(block).is_none()
    }

    pub fn prev_block_of(&self, block: BlockId) -> Option<BlockId> {
        self.blocks.get(&block)?.prev
    }

    pub fn next_block_of(&self, block: BlockId) -> Option<BlockId> {
        self.blocks.get(&block)?.next
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.blocks.get(&block)?.first_inst
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.blocks.get(&block)?.last_inst
    }

    pub fn prev_inst_of(&self, inst: InstId) -> Option<InstId> {
        self.insts.get(&inst)?.prev
    }

    pub fn next_inst_of(&self, inst: InstId) -> Option<InstId> {
        self.insts.get(&inst)?.next
    }

    pub fn inst_block(&self, inst: InstId) -> BlockId {
        self.insts[&inst].block
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.insts.contains_key(&inst)
    }

    pub fn iter_block(&self) -> impl Iterator<Item = BlockId> + '_ {
        std::iter::successors(self.first_block, |block| self.next_block_of(*block))
    }

    pub fn iter_inst(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        std::iter::successors(self.first_inst_of(block), |inst| self.next_inst_of(*inst))
    }

    pub fn append_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_block_inserted(block));

        let mut node = BlockNode::default();
        if let Some(last_block) = self.last_block {
            self.blocks.get_mut(&last_block).unwrap().next = Some(block);
            node.prev = Some(last_block);
        } else {
            self.first_block = Some(block);
        }

        self.blocks.insert(block, node);
        self.last_block = Some(block);
    }

    pub fn insert_block_after(&mut self, block: BlockId, after: BlockId) {
        debug_assert!(!self.is_block_inserted(block) && self.is_block_inserted(after));

        if self.last_block == Some(after) {
            self.append_block(block);
            return;
        }

        let next = self.blocks[&after].next;
        let node = BlockNode {
            prev: Some(after),
            next,
            ..BlockNode::default()
        };
        self.blocks.get_mut(&after).unwrap().next = Some(block);
        if let Some(next) = next {
            self.blocks.get_mut(&next).unwrap().prev = Some(block);
        }
        self.blocks.insert(block, node);
    }

    pub fn remove_block(&mut self, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(self.is_block_empty(block));

        let node = self.blocks.remove(&block).unwrap();
        match node.prev {
            Some(prev) => self.blocks.get_mut(&prev).unwrap().next = node.next,
            None => self.first_block = node.next,
        }
        match node.next {
            Some(next) => self.blocks.get_mut(&next).unwrap().prev = node.prev,
            None => self.last_block = node.prev,
        }
    }

    pub fn append_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));

        let mut node = InstNode::new(block);
        let block_node = self.blocks.get_mut(&block).unwrap();
        if let Some(last_inst) = block_node.last_inst {
            node.prev = Some(last_inst);
            block_node.last_inst = Some(inst);
            self.insts.get_mut(&last_inst).unwrap().next = Some(inst);
        } else {
            block_node.first_inst = Some(inst);
            block_node.last_inst = Some(inst);
        }

        self.insts.insert(inst, node);
    }

    pub fn prepend_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));

        let mut node = InstNode::new(block);
        let block_node = self.blocks.get_mut(&block).unwrap();
        if let Some(first_inst) = block_node.first_inst {
            node.next = Some(first_inst);
            block_node.first_inst = Some(inst);
            self.insts.get_mut(&first_inst).unwrap().prev = Some(inst);
        } else {
            block_node.first_inst = Some(inst);
            block_node.last_inst = Some(inst);
        }

        self.insts.insert(inst, node);
    }

    pub fn insert_inst_before(&mut self, inst: InstId, before: InstId) {
        debug_assert!(self.is_inst_inserted(before));
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.inst_block(before);
        let prev = self.prev_inst_of(before);
        let node = InstNode {
            block,
            prev,
            next: Some(before),
        };
        match prev {
            Some(prev) => self.insts.get_mut(&prev).unwrap().next = Some(inst),
            None => self.blocks.get_mut(&block).unwrap().first_inst = Some(inst),
        }
        self.insts.get_mut(&before).unwrap().prev = Some(inst);
        self.insts.insert(inst, node);
    }

    pub fn insert_inst_after(&mut self, inst: InstId, after: InstId) {
        debug_assert!(self.is_inst_inserted(after));
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.inst_block(after);
        let next = self.next_inst_of(after);
        let node = InstNode {
            block,
            prev: Some(after),
            next,
        };
        match next {
            Some(next) => self.insts.get_mut(&next).unwrap().prev = Some(inst),
            None => self.blocks.get_mut(&block).unwrap().last_inst = Some(inst),
        }
        self.insts.get_mut(&after).unwrap().next = Some(inst);
        self.insts.insert(inst, node);
    }

    pub fn remove_inst(&mut self, inst: InstId) {
        debug_assert!(self.is_inst_inserted(inst));

        let node = self.insts.remove(&inst).unwrap();
        let block_node = self.blocks.get_mut(&node.block).unwrap();
        match node.prev {
            Some(prev) => self.insts.get_mut(&prev).unwrap().next = node.next,
            None => block_node.first_inst = node.next,
        }
        let block_node = self.blocks.get_mut(&node.block).unwrap();
        match node.next {
            Some(next) => self.insts.get_mut(&next).unwrap().prev = node.prev,
            None => block_node.last_inst = node.prev,
        }
    }

    /// Splits the block containing `at` immediately before it: `at` and every
    /// following instruction move into `new_block`, which is inserted right
    /// after the original block. The caller is responsible for terminating
    /// the original block.
    pub fn split_block_before(&mut self, at: InstId, new_block: BlockId) {
        debug_assert!(self.is_inst_inserted(at));
        debug_assert!(!self.is_block_inserted(new_block));

        let old_block = self.inst_block(at);
        self.insert_block_after(new_block, old_block);

        let prev = self.prev_inst_of(at);
        let old_last = self.last_inst_of(old_block);

        // Detach the tail from the old block.
        match prev {
            Some(prev) => self.insts.get_mut(&prev).unwrap().next = None,
            None => self.blocks.get_mut(&old_block).unwrap().first_inst = None,
        }
        let old_node = self.blocks.get_mut(&old_block).unwrap();
        old_node.last_inst = prev;

        // Attach it to the new block.
        let new_node = self.blocks.get_mut(&new_block).unwrap();
        new_node.first_inst = Some(at);
        new_node.last_inst = old_last;
        self.insts.get_mut(&at).unwrap().prev = None;

        let mut cursor = Some(at);
        while let Some(inst) = cursor {
            let inst_node = self.insts.get_mut(&inst).unwrap();
            inst_node.block = new_block;
            cursor = inst_node.next;
        }
    }
}

#[derive(Debug, Clone, Default)]
struct BlockNode {
    prev: Option<BlockId>,
    next: Option<BlockId>,
    first_inst: Option<InstId>,
    last_inst: Option<InstId>,
}

#[derive(Debug, Clone)]
struct InstNode {
    /// The block in which the inst exists.
    block: BlockId,
    prev: Option<InstId>,
    next: Option<InstId>,
}

impl InstNode {
    fn new(block: BlockId) -> Self {
        Self {
            block,
            prev: None,
            next: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use cranelift_entity::PrimaryMap;

    use super::*;
    use crate::dfg::Block;

    fn make_entities(num_blocks: usize, num_insts: usize) -> (Vec<BlockId>, Vec<InstId>) {
        let mut blocks: PrimaryMap<BlockId, Block> = PrimaryMap::default();
        let block_ids: Vec<_> = (0..num_blocks).map(|_| blocks.push(Block::new())).collect();
        let inst_ids: Vec<_> = (0..num_insts as u32).map(InstId).collect();
        (block_ids, inst_ids)
    }

    #[test]
    fn inst_order_after_inserts() {
        let (blocks, insts) = make_entities(1, 4);
        let mut layout = Layout::new();
        layout.append_block(blocks[0]);

        layout.append_inst(insts[0], blocks[0]);
        layout.append_inst(insts[3], blocks[0]);
        layout.insert_inst_after(insts[1], insts[0]);
        layout.insert_inst_before(insts[2], insts[3]);

        let order: Vec<_> = layout.iter_inst(blocks[0]).collect();
        assert_eq!(order, vec![insts[0], insts[1], insts[2], insts[3]]);
    }

    #[test]
    fn split_block_moves_tail() {
        let (blocks, insts) = make_entities(2, 4);
        let mut layout = Layout::new();
        layout.append_block(blocks[0]);
        for inst in &insts {
            layout.append_inst(*inst, blocks[0]);
        }

        layout.split_block_before(insts[2], blocks[1]);

        let head: Vec<_> = layout.iter_inst(blocks[0]).collect();
        let tail: Vec<_> = layout.iter_inst(blocks[1]).collect();
        assert_eq!(head, vec![insts[0], insts[1]]);
        assert_eq!(tail, vec![insts[2], insts[3]]);
        assert_eq!(layout.inst_block(insts[3]), blocks[1]);
        assert_eq!(layout.iter_block().collect::<Vec<_>>(), blocks);
    }

    #[test]
    fn remove_inst_relinks_neighbors() {
        let (blocks, insts) = make_entities(1, 3);
        let mut layout = Layout::new();
        layout.append_block(blocks[0]);
        for inst in &insts {
            layout.append_inst(*inst, blocks[0]);
        }

        layout.remove_inst(insts[1]);
        let order: Vec<_> = layout.iter_inst(blocks[0]).collect();
        assert_eq!(order, vec![insts[0], insts[2]]);
        assert_eq!(layout.last_inst_of(blocks[0]), Some(insts[2]));
    }
}
