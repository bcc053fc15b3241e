//! This module contains the memheat IR data flow graph.

use cranelift_entity::{packed_option::PackedOption, PrimaryMap, SecondaryMap};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{
    debug_info::{DebugLoc, DebugLocId},
    global_variable::GlobalVariable,
    inst::{InsnData, InstId},
    metadata::{MemProfAttr, MibEntry},
    value::MaskLane,
    Immediate, Type, Value, ValueId,
};

/// An opaque reference to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);
cranelift_entity::entity_impl!(BlockId);

/// A basic block data definition.
#[derive(Debug, Clone, Default)]
pub struct Block {}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct DataFlowGraph {
    #[doc(hidden)]
    pub blocks: PrimaryMap<BlockId, Block>,
    #[doc(hidden)]
    pub values: PrimaryMap<ValueId, Value>,
    insts: PrimaryMap<InstId, InsnData>,
    inst_results: SecondaryMap<InstId, PackedOption<ValueId>>,
    immediates: FxHashMap<Immediate, ValueId>,

    debug_locs: PrimaryMap<DebugLocId, DebugLoc>,
    inst_debug_locs: SecondaryMap<InstId, PackedOption<DebugLocId>>,

    /// Values holding language-reserved error slots; accesses through them
    /// are never instrumented.
    err_slots: FxHashSet<ValueId>,

    memprof_attrs: FxHashMap<InstId, MemProfAttr>,
    mib_metadata: FxHashMap<InstId, Vec<MibEntry>>,
    callsite_metadata: FxHashMap<InstId, Vec<u64>>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self {
            blocks: PrimaryMap::default(),
            values: PrimaryMap::default(),
            insts: PrimaryMap::default(),
            inst_results: SecondaryMap::default(),
            immediates: FxHashMap::default(),
            debug_locs: PrimaryMap::default(),
            inst_debug_locs: SecondaryMap::default(),
            err_slots: FxHashSet::default(),
            memprof_attrs: FxHashMap::default(),
            mib_metadata: FxHashMap::default(),
            callsite_metadata: FxHashMap::default(),
        }
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    pub fn make_value(&mut self, value: Value) -> ValueId {
        self.values.push(value)
    }

    pub fn make_inst(&mut self, data: InsnData) -> InstId {
        self.insts.push(data)
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        let imm: Immediate = imm.into();
        if let Some(&value) = self.immediates.get(&imm) {
            return value;
        }

        let ty = imm.ty();
        let value = self.make_value(Value::Immediate { imm, ty });
        self.immediates.insert(imm, value);
        value
    }

    pub fn make_mask_value(&mut self, lanes: &[MaskLane], ty: Type) -> ValueId {
        debug_assert!(ty.as_vec().is_some());
        let lanes: SmallVec<[MaskLane; 8]> = lanes.into();
        self.make_value(Value::MaskConst { lanes, ty })
    }

    pub fn make_global_value(&mut self, gv: GlobalVariable) -> ValueId {
        self.make_value(Value::Global {
            gv,
            ty: Type::ptr(),
        })
    }

    pub fn make_arg_value(&mut self, ty: Type, idx: usize) -> Value {
        Value::Arg { ty, idx }
    }

    pub fn inst(&self, inst_id: InstId) -> &InsnData {
        &self.insts[inst_id]
    }

    pub fn inst_mut(&mut self, inst_id: InstId) -> &mut InsnData {
        &mut self.insts[inst_id]
    }

    pub fn replace_inst(&mut self, inst_id: InstId, data: InsnData) {
        self.insts[inst_id] = data;
    }

    pub fn value(&self, value_id: ValueId) -> &Value {
        &self.values[value_id]
    }

    pub fn value_ty(&self, value_id: ValueId) -> Type {
        self.values[value_id].ty()
    }

    /// Returns the instruction that defines `value`, if any.
    pub fn value_inst(&self, value_id: ValueId) -> Option<InstId> {
        match self.values[value_id] {
            Value::Inst { inst, .. } => Some(inst),
            _ => None,
        }
    }

    /// Creates a result value for `inst` if its opcode produces one.
    pub fn make_result(&mut self, inst_id: InstId) -> Option<ValueId> {
        let ty = self.insts[inst_id].result_type(self)?;
        Some(self.make_result_with_ty(inst_id, ty))
    }

    /// Creates a result value of an explicit type, for opcodes (calls) whose
    /// result type is not derivable from the instruction alone.
    pub fn make_result_with_ty(&mut self, inst_id: InstId, ty: Type) -> ValueId {
        let value = self.make_value(Value::Inst { inst: inst_id, ty });
        debug_assert!(self.inst_results[inst_id].is_none());
        self.inst_results[inst_id] = value.into();
        value
    }

    pub fn inst_result(&self, inst_id: InstId) -> Option<ValueId> {
        self.inst_results[inst_id].expand()
    }

    pub fn mark_err_slot(&mut self, value: ValueId) {
        self.err_slots.insert(value);
    }

    pub fn is_err_slot(&self, value: ValueId) -> bool {
        self.err_slots.contains(&value)
    }

    /// Peels pointer offset computations and casts back to the value the
    /// address is ultimately derived from.
    pub fn underlying_object(&self, value: ValueId) -> ValueId {
        let mut current = value;
        loop {
            let Some(inst) = self.value_inst(current) else {
                return current;
            };
            match self.inst(inst) {
                InsnData::Gep { args } => current = args[0],
                InsnData::Cast { args, .. } => current = args[0],
                _ => return current,
            }
        }
    }

    /// Returns `true` if `addr` is derived from a stack slot.
    pub fn is_stack_addr(&self, addr: ValueId) -> bool {
        let obj = self.underlying_object(addr);
        self.value_inst(obj)
            .is_some_and(|inst| matches!(self.inst(inst), InsnData::Alloca { .. }))
    }

    pub fn make_debug_loc(&mut self, loc: DebugLoc) -> DebugLocId {
        self.debug_locs.push(loc)
    }

    pub fn debug_loc(&self, id: DebugLocId) -> &DebugLoc {
        &self.debug_locs[id]
    }

    pub fn set_inst_debug_loc(&mut self, inst: InstId, loc: DebugLocId) {
        self.inst_debug_locs[inst] = loc.into();
    }

    pub fn inst_debug_loc(&self, inst: InstId) -> Option<DebugLocId> {
        self.inst_debug_locs[inst].expand()
    }

    /// Iterates an instruction's debug chain from the innermost location out
    /// to the location it was ultimately inlined into.
    pub fn debug_loc_chain(&self, inst: InstId) -> DebugLocChainIter<'_> {
        DebugLocChainIter {
            dfg: self,
            next: self.inst_debug_loc(inst),
        }
    }

    pub fn set_memprof_attr(&mut self, inst: InstId, attr: MemProfAttr) {
        self.memprof_attrs.insert(inst, attr);
    }

    pub fn memprof_attr(&self, inst: InstId) -> Option<&MemProfAttr> {
        self.memprof_attrs.get(&inst)
    }

    pub fn set_mib_metadata(&mut self, inst: InstId, entries: Vec<MibEntry>) {
        self.mib_metadata.insert(inst, entries);
    }

    pub fn mib_metadata(&self, inst: InstId) -> Option<&[MibEntry]> {
        self.mib_metadata.get(&inst).map(Vec::as_slice)
    }

    pub fn set_callsite_metadata(&mut self, inst: InstId, stack_ids: Vec<u64>) {
        self.callsite_metadata.insert(inst, stack_ids);
    }

    pub fn callsite_metadata(&self, inst: InstId) -> Option<&[u64]> {
        self.callsite_metadata.get(&inst).map(Vec::as_slice)
    }
}

impl Default for DataFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DebugLocChainIter<'a> {
    dfg: &'a DataFlowGraph,
    next: Option<DebugLocId>,
}

impl<'a> Iterator for DebugLocChainIter<'a> {
    type Item = &'a DebugLoc;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let loc = self.dfg.debug_loc(id);
        self.next = loc.inlined_at.expand();
        Some(loc)
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::debug_info::ScopeRef;
    use crate::inst::CastOp;

    #[test]
    fn underlying_object_peels_geps_and_casts() {
        let mut dfg = DataFlowGraph::new();

        let alloca = dfg.make_inst(InsnData::Alloca { ty: Type::I64 });
        let slot = dfg.make_result(alloca).unwrap();

        let idx = dfg.make_imm_value(1i64);
        let gep = dfg.make_inst(InsnData::Gep {
            args: smallvec![slot, idx],
        });
        let elem = dfg.make_result(gep).unwrap();

        let cast = dfg.make_inst(InsnData::cast(CastOp::PtrToInt, elem, Type::I64));
        let as_int = dfg.make_result(cast).unwrap();

        assert_eq!(dfg.underlying_object(as_int), slot);
        assert!(dfg.is_stack_addr(elem));
        assert!(!dfg.is_stack_addr(idx));
    }

    #[test]
    fn debug_chain_walks_innermost_to_outermost() {
        let mut dfg = DataFlowGraph::new();
        let scope = ScopeRef(0);

        let outer = dfg.make_debug_loc(DebugLoc::new(30, 1, scope));
        let inner = dfg.make_debug_loc(DebugLoc::inlined(7, 2, scope, outer));

        let inst = dfg.make_inst(InsnData::Return {
            args: Default::default(),
        });
        dfg.set_inst_debug_loc(inst, inner);

        let lines: Vec<u32> = dfg.debug_loc_chain(inst).map(|loc| loc.line).collect();
        assert_eq!(lines, vec![7, 30]);
    }
}
