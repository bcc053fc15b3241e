//! A small function builder used by frontends and tests.

use crate::{
    debug_info::{DebugLoc, DebugLocId, ScopeRef},
    dfg::BlockId,
    func_cursor::{CursorLocation, FuncCursor, InsnInserter},
    inst::InsnData,
    module::{FuncRef, Module},
    Function, InstId, Type, ValueId,
};

pub struct FunctionBuilder<'a> {
    pub module: &'a mut Module,
    func_ref: FuncRef,
    cursor: InsnInserter,
    debug_loc: Option<DebugLocId>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(module: &'a mut Module, func_ref: FuncRef) -> Self {
        Self {
            module,
            func_ref,
            cursor: InsnInserter::default(),
            debug_loc: None,
        }
    }

    pub fn func(&self) -> &Function {
        &self.module.funcs[self.func_ref]
    }

    pub fn func_mut(&mut self) -> &mut Function {
        &mut self.module.funcs[self.func_ref]
    }

    pub fn func_ref(&self) -> FuncRef {
        self.func_ref
    }

    pub fn args(&self) -> &[ValueId] {
        &self.func().arg_values
    }

    pub fn append_block(&mut self) -> BlockId {
        let func = &mut self.module.funcs[self.func_ref];
        let block = func.dfg.make_block();
        func.layout.append_block(block);
        block
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.cursor.set_location(CursorLocation::BlockBottom(block));
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<crate::Immediate>,
    {
        self.func_mut().dfg.make_imm_value(imm)
    }

    /// Sets the debug location stamped onto subsequently inserted
    /// instructions. `None` clears it.
    pub fn set_debug_loc(&mut self, loc: Option<DebugLocId>) {
        self.debug_loc = loc;
    }

    pub fn make_debug_loc(
        &mut self,
        line: u32,
        column: u32,
        scope: ScopeRef,
        inlined_at: Option<DebugLocId>,
    ) -> DebugLocId {
        let loc = match inlined_at {
            Some(outer) => DebugLoc::inlined(line, column, scope, outer),
            None => DebugLoc::new(line, column, scope),
        };
        self.func_mut().dfg.make_debug_loc(loc)
    }

    /// Inserts an instruction that produces a result and returns the result
    /// value.
    pub fn insert_inst(&mut self, data: InsnData) -> ValueId {
        let inst = self.insert_inst_no_result(data);
        let func = &mut self.module.funcs[self.func_ref];
        func.dfg
            .make_result(inst)
            .expect("inserted inst has no result")
    }

    pub fn insert_inst_no_result(&mut self, data: InsnData) -> InstId {
        let func = &mut self.module.funcs[self.func_ref];
        let inst = self.cursor.insert_inst_data(func, data);
        if let Some(loc) = self.debug_loc {
            func.dfg.set_inst_debug_loc(inst, loc);
        }
        inst
    }

    /// Inserts a direct call, attaching a result value when the callee
    /// returns one.
    pub fn call(&mut self, callee: FuncRef, args: &[ValueId]) -> (InstId, Option<ValueId>) {
        let ret_ty = self.module.funcs[callee].sig.ret_ty();
        let inst = self.insert_inst_no_result(InsnData::call(callee, args));
        let func = &mut self.module.funcs[self.func_ref];
        let result = match ret_ty {
            Type::Unit => None,
            ty => Some(func.dfg.make_result_with_ty(inst, ty)),
        };
        (inst, result)
    }
}

pub mod test_util {
    use crate::{
        module::Module,
        target::TargetSpec,
        Linkage, Signature, Type,
    };

    pub fn test_module() -> Module {
        Module::new(TargetSpec::host())
    }

    pub fn test_func_sig(name: &str, args: &[Type], ret_ty: Type) -> Signature {
        Signature::new(name, Linkage::Public, args, ret_ty)
    }

    pub fn external_func_sig(name: &str, args: &[Type], ret_ty: Type) -> Signature {
        Signature::new(name, Linkage::External, args, ret_ty)
    }
}
