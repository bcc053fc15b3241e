//! Caller→callee edge extraction from the IR's debug-location chains.

use memheat_ir::{AllocKind, Module};
use memheat_profile::{CallEdge, LineLocation};
use rustc_hash::FxHashMap;

use crate::fingerprint::function_fingerprint;

/// True if `kind` names a heap allocator eligible for hot/cold hinting.
/// Allocators already carrying an explicit hint are only eligible when
/// `match_hot_cold_new` asks for their hints to be overridden.
pub(crate) fn is_hintable_alloc(kind: AllocKind, match_hot_cold_new: bool) -> bool {
    match kind {
        AllocKind::NotAlloc => false,
        AllocKind::NewUnhinted => true,
        AllocKind::NewHinted => match_hot_cold_new,
    }
}

/// Line offsets wrap at 16 bits, matching the profile encoding.
pub(crate) fn line_offset(line: u32, decl_line: u32) -> u32 {
    line.wrapping_sub(decl_line) & 0xffff
}

/// Walks every direct call's inlining chain and collects, per enclosing
/// function, the ordered deduplicated list of (location, callee) edges.
///
/// Calls into the inline stack of a hintable heap allocation are anonymized:
/// the leaf callee is recorded as 0, and the zero-forcing continues outward
/// until a callee known to the profile is reached, mirroring the profile's
/// own leaf convention.
pub fn extract_calls_from_ir<F>(
    module: &Module,
    match_hot_cold_new: bool,
    is_present_in_profile: F,
) -> FxHashMap<u64, Vec<CallEdge>>
where
    F: Fn(u64) -> bool,
{
    let mut calls: FxHashMap<u64, Vec<CallEdge>> = FxHashMap::default();

    for func_ref in module.iter_functions() {
        if module.is_external(func_ref) {
            continue;
        }
        let func = &module.funcs[func_ref];

        for block in func.layout.iter_block() {
            for inst in func.layout.iter_inst(block) {
                // Disregard anything but direct calls; intrinsics are
                // dedicated opcodes in this IR.
                let Some(callee) = func.dfg.inst(inst).callee() else {
                    continue;
                };
                let callee_sig = &module.funcs[callee].sig;

                let mut is_alloc = is_hintable_alloc(callee_sig.alloc_kind, match_hot_cold_new);
                let mut is_leaf = true;
                let mut callee_fp = function_fingerprint(callee_sig.name());

                for loc in func.dfg.debug_loc_chain(inst) {
                    let scope = module.scope(loc.scope);
                    debug_assert!(
                        !scope.linkage_name.is_empty(),
                        "debug scopes must carry linkage names"
                    );
                    let caller_fp = function_fingerprint(&scope.linkage_name);

                    // Pretend we are calling a function with fingerprint 0
                    // while inside the inline stack leading to a heap
                    // allocation, until a callee the profile knows appears.
                    if is_alloc {
                        if is_leaf {
                            callee_fp = 0;
                        } else if !is_present_in_profile(callee_fp) {
                            callee_fp = 0;
                        } else {
                            is_alloc = false;
                        }
                    }

                    let loc = LineLocation::new(
                        line_offset(loc.line, scope.decl_line),
                        loc.column,
                    );
                    calls.entry(caller_fp).or_default().push((loc, callee_fp));

                    callee_fp = caller_fp;
                    is_leaf = false;
                }
            }
        }
    }

    // Sort each call list by the source location.
    for call_list in calls.values_mut() {
        call_list.sort_unstable();
        call_list.dedup();
    }

    calls
}

#[cfg(test)]
mod tests {
    use memheat_ir::{builder::test_util::*, FunctionBuilder, Subprogram, Type};

    use super::*;
    use crate::fingerprint::function_fingerprint;

    #[test]
    fn anonymizes_alloc_leaves_until_known_callee() {
        let mut module = test_module();

        let mut alloc_sig = external_func_sig("operator_new", &[Type::I64], Type::ptr());
        alloc_sig.alloc_kind = memheat_ir::AllocKind::NewUnhinted;
        let alloc = module.declare_function(alloc_sig);

        let caller = module.declare_function(test_func_sig("caller", &[], Type::Unit));

        // `caller` calls `operator_new` through a chain inlined from
        // `inner` (unknown to the profile) into `caller` itself.
        let inner_scope = module.make_scope(Subprogram::new("inner", 10));
        let caller_scope = module.make_scope(Subprogram::new("caller", 100));

        let mut builder = FunctionBuilder::new(&mut module, caller);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let outer = builder.make_debug_loc(105, 3, caller_scope, None);
        let leaf = builder.make_debug_loc(12, 7, inner_scope, Some(outer));
        builder.set_debug_loc(Some(leaf));
        let size = builder.make_imm_value(16i64);
        builder.call(alloc, &[size]);
        builder.set_debug_loc(None);
        builder.insert_inst_no_result(memheat_ir::InsnData::Return {
            args: Default::default(),
        });

        let caller_fp = function_fingerprint("caller");
        let inner_fp = function_fingerprint("inner");

        let calls = extract_calls_from_ir(&module, false, |_| false);

        // Leaf edge in `inner`: anonymized callee.
        assert_eq!(calls[&inner_fp], vec![(LineLocation::new(2, 7), 0)]);
        // Outer edge in `caller`: still anonymized because `inner` is not in
        // the profile.
        assert_eq!(calls[&caller_fp], vec![(LineLocation::new(5, 3), 0)]);

        // With `inner` present in the profile the outer edge keeps its real
        // callee.
        let calls = extract_calls_from_ir(&module, false, |fp| fp == inner_fp);
        assert_eq!(calls[&caller_fp], vec![(LineLocation::new(5, 3), inner_fp)]);
    }

    #[test]
    fn non_alloc_calls_keep_callees_and_dedup() {
        let mut module = test_module();
        let callee = module.declare_function(external_func_sig("callee", &[], Type::Unit));
        let caller = module.declare_function(test_func_sig("caller", &[], Type::Unit));
        let scope = module.make_scope(Subprogram::new("caller", 1));

        let mut builder = FunctionBuilder::new(&mut module, caller);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let loc = builder.make_debug_loc(4, 2, scope, None);
        builder.set_debug_loc(Some(loc));
        // The same call location twice; the edge list must deduplicate.
        builder.call(callee, &[]);
        builder.call(callee, &[]);
        builder.set_debug_loc(None);
        builder.insert_inst_no_result(memheat_ir::InsnData::Return {
            args: Default::default(),
        });

        let calls = extract_calls_from_ir(&module, false, |_| true);
        let caller_fp = function_fingerprint("caller");
        let callee_fp = function_fingerprint("callee");
        assert_eq!(calls[&caller_fp], vec![(LineLocation::new(3, 2), callee_fp)]);
    }

    #[test]
    fn intrinsic_and_indirect_calls_contribute_no_edges() {
        let mut module = test_module();
        let caller = module.declare_function(test_func_sig("caller", &[Type::ptr()], Type::Unit));
        let scope = module.make_scope(Subprogram::new("caller", 1));

        let mut builder = FunctionBuilder::new(&mut module, caller);
        let block = builder.append_block();
        builder.switch_to_block(block);
        let loc = builder.make_debug_loc(2, 1, scope, None);
        builder.set_debug_loc(Some(loc));
        let target = builder.args()[0];
        builder.insert_inst_no_result(memheat_ir::InsnData::CallIndirect {
            args: [target].as_slice().into(),
        });
        builder.insert_inst_no_result(memheat_ir::InsnData::Return {
            args: Default::default(),
        });

        let calls = extract_calls_from_ir(&module, false, |_| true);
        assert!(calls.is_empty());
    }
}
