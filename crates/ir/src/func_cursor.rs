use crate::{dfg::BlockId, inst::InsnData, Function, InstId, ValueId};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorLocation {
    At(InstId),
    BlockTop(BlockId),
    BlockBottom(BlockId),
    #[default]
    NoWhere,
}

pub trait FuncCursor {
    fn at_location(loc: CursorLocation) -> Self;
    fn set_location(&mut self, loc: CursorLocation);
    fn loc(&self) -> CursorLocation;

    fn set_to_entry(&mut self, func: &Function) {
        let loc = if let Some(entry) = func.layout.entry_block() {
            CursorLocation::BlockTop(entry)
        } else {
            CursorLocation::NoWhere
        };

        self.set_location(loc);
    }

    fn insert_inst(&mut self, func: &mut Function, inst: InstId) {
        match self.loc() {
            CursorLocation::At(at) => func.layout.insert_inst_after(inst, at),
            CursorLocation::BlockTop(block) => func.layout.prepend_inst(inst, block),
            CursorLocation::BlockBottom(block) => func.layout.append_inst(inst, block),
            CursorLocation::NoWhere => panic!("cursor loc points to `NoWhere`"),
        }
    }

    /// Inserts `data` at the cursor location and advances the cursor to it.
    fn insert_inst_data(&mut self, func: &mut Function, data: InsnData) -> InstId {
        let inst = func.dfg.make_inst(data);
        self.insert_inst(func, inst);
        self.set_location(CursorLocation::At(inst));
        inst
    }

    /// Inserts `data` before the cursor location without moving the cursor.
    fn insert_inst_data_before(&mut self, func: &mut Function, data: InsnData) -> InstId {
        let inst = func.dfg.make_inst(data);
        match self.loc() {
            CursorLocation::At(at) => func.layout.insert_inst_before(inst, at),
            CursorLocation::BlockTop(block) => func.layout.prepend_inst(inst, block),
            CursorLocation::BlockBottom(block) => func.layout.append_inst(inst, block),
            CursorLocation::NoWhere => panic!("cursor loc points to `NoWhere`"),
        }
        inst
    }

    fn append_inst_data(&mut self, func: &mut Function, data: InsnData) -> InstId {
        let inst = func.dfg.make_inst(data);
        let block = self.expect_block(func);
        func.layout.append_inst(inst, block);
        inst
    }

    fn prepend_inst_data(&mut self, func: &mut Function, data: InsnData) -> InstId {
        let inst = func.dfg.make_inst(data);
        let block = self.expect_block(func);
        func.layout.prepend_inst(inst, block);
        inst
    }

    fn replace(&mut self, func: &mut Function, data: InsnData) {
        let inst = self.expect_inst();
        func.dfg.replace_inst(inst, data);
    }

    fn remove_inst(&mut self, func: &mut Function) {
        let inst = self.expect_inst();
        let next_loc = self.next_loc(func);
        func.layout.remove_inst(inst);
        self.set_location(next_loc);
    }

    fn make_result(&mut self, func: &mut Function, inst: InstId) -> Option<ValueId> {
        func.dfg.make_result(inst)
    }

    fn make_block(&mut self, func: &mut Function) -> BlockId {
        func.dfg.make_block()
    }

    fn inst(&self) -> Option<InstId> {
        if let CursorLocation::At(inst) = self.loc() {
            Some(inst)
        } else {
            None
        }
    }

    fn expect_inst(&self) -> InstId {
        self.inst()
            .expect("current cursor location doesn't point to inst")
    }

    fn block(&self, func: &Function) -> Option<BlockId> {
        match self.loc() {
            CursorLocation::At(inst) => Some(func.layout.inst_block(inst)),
            CursorLocation::BlockTop(block) | CursorLocation::BlockBottom(block) => Some(block),
            CursorLocation::NoWhere => None,
        }
    }

    fn expect_block(&self, func: &Function) -> BlockId {
        self.block(func).expect("cursor loc points to `NoWhere`")
    }

    fn insert_block(&mut self, func: &mut Function, block: BlockId) {
        if let Some(current) = self.block(func) {
            func.layout.insert_block_after(block, current)
        } else {
            panic!("cursor loc points to `NoWhere`")
        }
    }

    fn append_block(&mut self, func: &mut Function, block: BlockId) {
        func.layout.append_block(block);
    }

    fn next_loc(&self, func: &Function) -> CursorLocation {
        match self.loc() {
            CursorLocation::At(inst) => func.layout.next_inst_of(inst).map_or_else(
                || CursorLocation::BlockBottom(func.layout.inst_block(inst)),
                CursorLocation::At,
            ),
            CursorLocation::BlockTop(block) => func
                .layout
                .first_inst_of(block)
                .map_or_else(|| CursorLocation::BlockBottom(block), CursorLocation::At),
            CursorLocation::BlockBottom(block) => func
                .layout
                .next_block_of(block)
                .map_or(CursorLocation::NoWhere, CursorLocation::BlockTop),
            CursorLocation::NoWhere => CursorLocation::NoWhere,
        }
    }

    fn proceed(&mut self, func: &Function) {
        self.set_location(self.next_loc(func));
    }
}

#[derive(Debug, Default)]
pub struct InsnInserter {
    loc: CursorLocation,
}

impl FuncCursor for InsnInserter {
    fn at_location(loc: CursorLocation) -> Self {
        Self { loc }
    }

    fn set_location(&mut self, loc: CursorLocation) {
        self.loc = loc;
    }

    fn loc(&self) -> CursorLocation {
        self.loc
    }
}
