//! This module contains memheat IR types definitions.

use std::fmt;

/// Memheat IR types definition.
///
/// Pointers carry their address space; the profiling passes only instrument
/// accesses through address space 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr(u8),
    Vec(VecTy),
    Unit,
}

impl Default for Type {
    fn default() -> Self {
        Type::Unit
    }
}

impl Type {
    pub fn ptr() -> Self {
        Self::Ptr(0)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    pub fn addr_space(&self) -> Option<u8> {
        match self {
            Self::Ptr(space) => Some(*space),
            _ => None,
        }
    }

    pub fn as_vec(&self) -> Option<VecTy> {
        match self {
            Self::Vec(vec_ty) => Some(*vec_ty),
            _ => None,
        }
    }
}

/// A fixed-width vector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VecTy {
    pub elem: ElemTy,
    pub lanes: u16,
}

impl VecTy {
    pub fn new(elem: ElemTy, lanes: u16) -> Self {
        debug_assert!(lanes > 0);
        Self { elem, lanes }
    }

    pub fn elem_ty(&self) -> Type {
        match self.elem {
            ElemTy::I1 => Type::I1,
            ElemTy::I8 => Type::I8,
            ElemTy::I16 => Type::I16,
            ElemTy::I32 => Type::I32,
            ElemTy::I64 => Type::I64,
        }
    }
}

/// Scalar element of a vector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemTy {
    I1,
    I8,
    I16,
    I32,
    I64,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::I1 => f.write_str("i1"),
            Self::I8 => f.write_str("i8"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::Ptr(0) => f.write_str("ptr"),
            Self::Ptr(space) => write!(f, "ptr addrspace({space})"),
            Self::Vec(vec_ty) => write!(f, "<{} x {}>", vec_ty.lanes, vec_ty.elem_ty()),
            Self::Unit => f.write_str("unit"),
        }
    }
}
