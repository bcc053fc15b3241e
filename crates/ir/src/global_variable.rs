use std::fmt;

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::{Immediate, Linkage, Type};

/// An opaque reference to [`GlobalVariableData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalVariable(pub u32);
cranelift_entity::entity_impl!(GlobalVariable);

#[derive(Debug, Default)]
pub struct GlobalVariableStore {
    gv_data: PrimaryMap<GlobalVariable, GlobalVariableData>,
    symbols: FxHashMap<String, GlobalVariable>,
}

impl GlobalVariableStore {
    pub fn make_gv(&mut self, gv_data: GlobalVariableData) -> GlobalVariable {
        match self.symbols.entry(gv_data.symbol.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                panic!("duplicate global symbol `{}`", gv_data.symbol);
            }
            std::collections::hash_map::Entry::Vacant(v) => {
                let gv = self.gv_data.push(gv_data);
                v.insert(gv);
                gv
            }
        }
    }

    pub fn gv_data(&self, gv: GlobalVariable) -> &GlobalVariableData {
        &self.gv_data[gv]
    }

    pub fn gv_data_mut(&mut self, gv: GlobalVariable) -> &mut GlobalVariableData {
        &mut self.gv_data[gv]
    }

    pub fn gv_by_symbol(&self, symbol: &str) -> Option<GlobalVariable> {
        self.symbols.get(symbol).copied()
    }

    pub fn ty(&self, gv: GlobalVariable) -> Type {
        self.gv_data[gv].ty
    }

    pub fn all_gv_data(&self) -> impl Iterator<Item = &GlobalVariableData> {
        self.gv_data.values()
    }
}

/// A global variable definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariableData {
    pub symbol: String,
    pub ty: Type,
    pub linkage: Linkage,
    pub is_const: bool,
    /// Object-file section, when pinned.
    pub section: Option<String>,
    /// COMDAT group name, when the target supports COMDAT.
    pub comdat: Option<String>,
    pub data: Option<GvInitializer>,
}

impl GlobalVariableData {
    pub fn new(symbol: impl Into<String>, ty: Type, linkage: Linkage) -> Self {
        Self {
            symbol: symbol.into(),
            ty,
            linkage,
            is_const: false,
            section: None,
            comdat: None,
            data: None,
        }
    }

    pub fn constant(symbol: impl Into<String>, ty: Type, linkage: Linkage, data: GvInitializer) -> Self {
        Self {
            symbol: symbol.into(),
            ty,
            linkage,
            is_const: true,
            section: None,
            comdat: None,
            data: Some(data),
        }
    }
}

/// An initializer of a global variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GvInitializer {
    Immediate(Immediate),
    /// A NUL-terminated string constant.
    Str(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for GvInitializer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Immediate(imm) => write!(f, "{imm}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(bytes) => write!(f, "{bytes:?}"),
        }
    }
}
