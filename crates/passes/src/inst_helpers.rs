//! Small insertion helpers shared by the instrumentation code paths.

use memheat_ir::{Function, InsnData, InstId, ValueId};

/// Inserts `data` immediately before `before` and returns its result value.
pub(crate) fn emit(func: &mut Function, before: InstId, data: InsnData) -> ValueId {
    let inst = func.dfg.make_inst(data);
    func.layout.insert_inst_before(inst, before);
    func.dfg
        .make_result(inst)
        .expect("emitted instruction has no result")
}

/// Inserts `data` immediately before `before`, discarding any result.
pub(crate) fn emit_no_result(func: &mut Function, before: InstId, data: InsnData) -> InstId {
    let inst = func.dfg.make_inst(data);
    func.layout.insert_inst_before(inst, before);
    inst
}

/// Splits the block at `before` and inserts a conditional then-block:
///
/// ```text
///   ..head..                ..head..
///   <before>        ==>     br cond, then, tail
///   ..tail..                then:  jump tail
///                           tail:  <before> ..tail..
/// ```
///
/// Returns the then-block terminator; code inserted before it runs only when
/// `cond` holds.
pub(crate) fn split_block_and_insert_if_then(
    func: &mut Function,
    cond: ValueId,
    before: InstId,
) -> InstId {
    let orig_block = func.layout.inst_block(before);

    let tail_block = func.dfg.make_block();
    func.layout.split_block_before(before, tail_block);

    let then_block = func.dfg.make_block();
    func.layout.insert_block_after(then_block, orig_block);

    let branch = func
        .dfg
        .make_inst(InsnData::branch(cond, then_block, tail_block));
    func.layout.append_inst(branch, orig_block);

    let jump = func.dfg.make_inst(InsnData::jump(tail_block));
    func.layout.append_inst(jump, then_block);
    jump
}
