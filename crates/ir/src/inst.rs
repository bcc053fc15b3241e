//! This module contains memheat IR instruction definitions.

use std::fmt;

use smallvec::SmallVec;

use crate::{dfg::BlockId, module::FuncRef, DataFlowGraph, Type, ValueId};

/// An opaque reference to [`InsnData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(pub u32);
cranelift_entity::entity_impl!(InstId);

/// An instruction data definition.
///
/// Memory intrinsics (`MemCopy`/`MemMove`/`MemSet`) are dedicated opcodes
/// rather than calls, so `Call` always refers to a real function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InsnData {
    /// Binary instructions.
    Binary { code: BinaryOp, args: [ValueId; 2] },

    /// Cast operations.
    Cast {
        code: CastOp,
        args: [ValueId; 1],
        ty: Type,
    },

    /// Load a value from memory.
    Load { args: [ValueId; 1], ty: Type },

    /// Store a value to memory. `args = [value, addr]`.
    Store { args: [ValueId; 2] },

    /// Atomic read-modify-write. `args = [value, addr]`.
    AtomicRmw {
        code: RmwOp,
        args: [ValueId; 2],
        ty: Type,
    },

    /// Atomic compare-exchange. `args = [addr, cmp, new]`.
    AtomicCmpXchg { args: [ValueId; 3], ty: Type },

    /// Masked vector load. `args = [addr, mask]`; `ty` is the vector type.
    MaskedLoad { args: [ValueId; 2], ty: Type },

    /// Masked vector store. `args = [value, addr, mask]`; `ty` is the vector type.
    MaskedStore { args: [ValueId; 3], ty: Type },

    /// Pointer offset computation. `args = [base, idx..]`.
    Gep { args: SmallVec<[ValueId; 4]> },

    /// Extract one lane from a vector. `args = [vec, idx]`.
    ExtractElement { args: [ValueId; 2] },

    /// A stack slot allocation.
    Alloca { ty: Type },

    /// A direct call.
    Call {
        callee: FuncRef,
        args: SmallVec<[ValueId; 4]>,
    },

    /// An indirect call. `args[0]` is the callee pointer.
    CallIndirect { args: SmallVec<[ValueId; 4]> },

    /// Block copy intrinsic. `args = [dst, src, len]`.
    MemCopy { args: [ValueId; 3] },

    /// Block move intrinsic. `args = [dst, src, len]`.
    MemMove { args: [ValueId; 3] },

    /// Block fill intrinsic. `args = [dst, val, len]`.
    MemSet { args: [ValueId; 3] },

    /// Unconditional jump instruction.
    Jump { dests: [BlockId; 1] },

    /// Conditional jump instruction. `dests = [then, else]`.
    Branch { args: [ValueId; 1], dests: [BlockId; 2] },

    /// Return.
    Return { args: SmallVec<[ValueId; 1]> },
}

impl InsnData {
    pub fn binary(code: BinaryOp, lhs: ValueId, rhs: ValueId) -> Self {
        Self::Binary {
            code,
            args: [lhs, rhs],
        }
    }

    pub fn cast(code: CastOp, arg: ValueId, ty: Type) -> Self {
        Self::Cast {
            code,
            args: [arg],
            ty,
        }
    }

    pub fn load(addr: ValueId, ty: Type) -> Self {
        Self::Load { args: [addr], ty }
    }

    pub fn store(value: ValueId, addr: ValueId) -> Self {
        Self::Store { args: [value, addr] }
    }

    pub fn call(callee: FuncRef, args: &[ValueId]) -> Self {
        Self::Call {
            callee,
            args: args.into(),
        }
    }

    pub fn jump(dest: BlockId) -> Self {
        Self::Jump { dests: [dest] }
    }

    pub fn branch(cond: ValueId, then_dest: BlockId, else_dest: BlockId) -> Self {
        Self::Branch {
            args: [cond],
            dests: [then_dest, else_dest],
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. }
        )
    }

    pub fn is_mem_intrinsic(&self) -> bool {
        matches!(
            self,
            Self::MemCopy { .. } | Self::MemMove { .. } | Self::MemSet { .. }
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. } | Self::CallIndirect { .. })
    }

    /// The callee of a direct call, if this is one.
    pub fn callee(&self) -> Option<FuncRef> {
        match self {
            Self::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }

    pub fn args(&self) -> &[ValueId] {
        match self {
            Self::Binary { args, .. } => args,
            Self::Cast { args, .. } | Self::Load { args, .. } => args,
            Self::Store { args, .. }
            | Self::AtomicRmw { args, .. }
            | Self::MaskedLoad { args, .. }
            | Self::ExtractElement { args, .. } => args,
            Self::AtomicCmpXchg { args, .. }
            | Self::MaskedStore { args, .. }
            | Self::MemCopy { args, .. }
            | Self::MemMove { args, .. }
            | Self::MemSet { args, .. } => args,
            Self::Gep { args } | Self::Call { args, .. } | Self::CallIndirect { args } => args,
            Self::Branch { args, .. } => args,
            Self::Return { args } => args,
            Self::Alloca { .. } | Self::Jump { .. } => &[],
        }
    }

    pub fn rewrite_branch_dest(&mut self, from: BlockId, to: BlockId) {
        match self {
            Self::Jump { dests } => {
                if dests[0] == from {
                    dests[0] = to;
                }
            }
            Self::Branch { dests, .. } => {
                for block in dests.iter_mut() {
                    if *block == from {
                        *block = to;
                    }
                }
            }
            _ => {}
        }
    }

    pub fn has_side_effect(&self) -> bool {
        !matches!(
            self,
            Self::Binary { .. } | Self::Cast { .. } | Self::Gep { .. } | Self::ExtractElement { .. }
        )
    }

    pub(crate) fn result_type(&self, dfg: &DataFlowGraph) -> Option<Type> {
        match self {
            Self::Binary { code, args } => Some(code.result_type(dfg, args)),
            Self::Cast { ty, .. }
            | Self::Load { ty, .. }
            | Self::AtomicRmw { ty, .. }
            | Self::AtomicCmpXchg { ty, .. }
            | Self::MaskedLoad { ty, .. } => Some(*ty),
            Self::Gep { .. } | Self::Alloca { .. } => Some(Type::ptr()),
            Self::ExtractElement { args, .. } => {
                let vec_ty = dfg.value_ty(args[0]).as_vec()?;
                Some(vec_ty.elem_ty())
            }
            _ => None,
        }
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    /// Unsigned less-than comparison.
    Lt,
    Eq,
    Ne,
}

impl BinaryOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Lshr => "lshr",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::Ne => "ne",
        }
    }

    pub fn is_cmp(self) -> bool {
        matches!(self, Self::Lt | Self::Eq | Self::Ne)
    }

    fn result_type(self, dfg: &DataFlowGraph, args: &[ValueId; 2]) -> Type {
        if self.is_cmp() {
            Type::I1
        } else {
            dfg.value_ty(args[0])
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cast operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Sext,
    Zext,
    Trunc,
    PtrToInt,
    IntToPtr,
}

impl CastOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Sext => "sext",
            Self::Zext => "zext",
            Self::Trunc => "trunc",
            Self::PtrToInt => "ptr_to_int",
            Self::IntToPtr => "int_to_ptr",
        }
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic read-modify-write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmwOp {
    Xchg,
    Add,
    Sub,
    And,
    Or,
    Xor,
}

impl RmwOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Xchg => "xchg",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }
}

impl fmt::Display for RmwOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
