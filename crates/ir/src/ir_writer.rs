//! A compact textual dump of functions, used by diagnostics and tests.

use std::fmt::Write;

use crate::{
    inst::InsnData,
    module::{FuncRef, Module},
    value::MaskLane,
    Function, InstId, Value, ValueId,
};

pub struct FuncWriter<'a> {
    module: &'a Module,
    func_ref: FuncRef,
}

impl<'a> FuncWriter<'a> {
    pub fn new(module: &'a Module, func_ref: FuncRef) -> Self {
        Self { module, func_ref }
    }

    pub fn dump_string(&self) -> String {
        let func = &self.module.funcs[self.func_ref];
        let sig = &func.sig;

        let mut w = String::new();
        write!(w, "func {} %{}(", sig.linkage(), sig.name()).unwrap();
        for (i, arg) in sig.args().iter().enumerate() {
            if i > 0 {
                w.push(' ');
            }
            write!(w, "{arg}").unwrap();
        }
        w.push(')');
        if !matches!(sig.ret_ty(), crate::Type::Unit) {
            write!(w, " -> {}", sig.ret_ty()).unwrap();
        }
        w.push_str(" {\n");

        for block in func.layout.iter_block() {
            writeln!(w, "    block{}:", block.0).unwrap();
            for inst in func.layout.iter_inst(block) {
                w.push_str("        ");
                self.write_inst(&mut w, func, inst);
                w.push('\n');
            }
        }

        w.push_str("}\n");
        w
    }

    fn write_inst(&self, w: &mut String, func: &Function, inst: InstId) {
        if let Some(result) = func.dfg.inst_result(inst) {
            let ty = func.dfg.value_ty(result);
            write!(w, "v{}.{} = ", result.0, ty).unwrap();
        }

        let data = func.dfg.inst(inst);
        match data {
            InsnData::Binary { code, args } => {
                write!(w, "{code}").unwrap();
                self.write_args(w, func, args);
            }
            InsnData::Cast { code, args, .. } => {
                write!(w, "{code}").unwrap();
                self.write_args(w, func, args);
            }
            InsnData::Load { args, .. } => {
                w.push_str("load");
                self.write_args(w, func, args);
            }
            InsnData::Store { args } => {
                w.push_str("store");
                self.write_args(w, func, args);
            }
            InsnData::AtomicRmw { code, args, .. } => {
                write!(w, "atomic_rmw {code}").unwrap();
                self.write_args(w, func, args);
            }
            InsnData::AtomicCmpXchg { args, .. } => {
                w.push_str("atomic_cmpxchg");
                self.write_args(w, func, args);
            }
            InsnData::MaskedLoad { args, .. } => {
                w.push_str("masked_load");
                self.write_args(w, func, args);
            }
            InsnData::MaskedStore { args, .. } => {
                w.push_str("masked_store");
                self.write_args(w, func, args);
            }
            InsnData::Gep { args } => {
                w.push_str("gep");
                self.write_args(w, func, args);
            }
            InsnData::ExtractElement { args } => {
                w.push_str("extract_element");
                self.write_args(w, func, args);
            }
            InsnData::Alloca { ty } => {
                write!(w, "alloca {ty}").unwrap();
            }
            InsnData::Call { callee, args } => {
                let name = self.module.funcs[*callee].sig.name();
                write!(w, "call %{name}").unwrap();
                self.write_args(w, func, args);
            }
            InsnData::CallIndirect { args } => {
                w.push_str("call_indirect");
                self.write_args(w, func, args);
            }
            InsnData::MemCopy { args } => {
                w.push_str("mem_copy");
                self.write_args(w, func, args);
            }
            InsnData::MemMove { args } => {
                w.push_str("mem_move");
                self.write_args(w, func, args);
            }
            InsnData::MemSet { args } => {
                w.push_str("mem_set");
                self.write_args(w, func, args);
            }
            InsnData::Jump { dests } => {
                write!(w, "jump block{}", dests[0].0).unwrap();
            }
            InsnData::Branch { args, dests } => {
                w.push_str("br");
                self.write_args(w, func, args);
                write!(w, " block{} block{}", dests[0].0, dests[1].0).unwrap();
            }
            InsnData::Return { args } => {
                w.push_str("return");
                self.write_args(w, func, args);
            }
        }
        w.push(';');
    }

    fn write_args(&self, w: &mut String, func: &Function, args: &[ValueId]) {
        for &arg in args {
            w.push(' ');
            self.write_value(w, func, arg);
        }
    }

    fn write_value(&self, w: &mut String, func: &Function, value: ValueId) {
        match func.dfg.value(value) {
            Value::Immediate { imm, .. } => write!(w, "{imm}").unwrap(),
            Value::Global { gv, .. } => {
                let symbol = &self.module.gv_store.gv_data(*gv).symbol;
                write!(w, "${symbol}").unwrap();
            }
            Value::MaskConst { lanes, .. } => {
                w.push_str("mask(");
                for (i, lane) in lanes.iter().enumerate() {
                    if i > 0 {
                        w.push(' ');
                    }
                    let s = match lane {
                        MaskLane::False => "0",
                        MaskLane::True => "1",
                        MaskLane::Undef => "undef",
                    };
                    w.push_str(s);
                }
                w.push(')');
            }
            Value::Inst { .. } | Value::Arg { .. } => write!(w, "v{}", value.0).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::test_util::*, FunctionBuilder, Type};

    #[test]
    fn dumps_blocks_and_insts() {
        let mut module = test_module();
        let func_ref = module.declare_function(test_func_sig("f", &[Type::ptr()], Type::I64));
        let mut builder = FunctionBuilder::new(&mut module, func_ref);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let addr = builder.args()[0];
        let loaded = builder.insert_inst(InsnData::load(addr, Type::I64));
        builder.insert_inst_no_result(InsnData::Return {
            args: [loaded].as_slice().into(),
        });

        let dump = FuncWriter::new(&module, func_ref).dump_string();
        assert!(dump.contains("func public %f(ptr) -> i64 {"));
        assert!(dump.contains("block0:"));
        assert!(dump.contains("v1.i64 = load v0;"));
        assert!(dump.contains("return v1;"));
    }
}
