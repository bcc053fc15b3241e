//! Target description consumed by the profiling passes.

use std::fmt;

use crate::Type;

/// Object file format of the compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    Elf,
    MachO,
    Coff,
    Wasm,
}

/// The facts about the target the passes consult: pointer width, object
/// format, and what those imply (COMDAT support, section names, constructor
/// priorities).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub pointer_width: u32,
    pub format: ObjectFormat,
}

impl TargetSpec {
    pub fn new(pointer_width: u32, format: ObjectFormat) -> Self {
        debug_assert!(pointer_width == 32 || pointer_width == 64);
        Self {
            pointer_width,
            format,
        }
    }

    pub fn host() -> Self {
        Self::new(64, ObjectFormat::Elf)
    }

    pub fn supports_comdat(&self) -> bool {
        !matches!(self.format, ObjectFormat::MachO)
    }

    /// The integer type as wide as a pointer.
    pub fn pointer_ty(&self) -> Type {
        match self.pointer_width {
            32 => Type::I32,
            _ => Type::I64,
        }
    }

    /// Section holding profiling counter globals; accesses into it are never
    /// instrumented.
    pub fn counters_section(&self) -> &'static str {
        match self.format {
            ObjectFormat::Elf | ObjectFormat::Wasm => "__memheat_cnts",
            ObjectFormat::MachO => "__DATA,__memheat_cnts",
            ObjectFormat::Coff => ".memheat$cnts",
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let format = match self.format {
            ObjectFormat::Elf => "elf",
            ObjectFormat::MachO => "macho",
            ObjectFormat::Coff => "coff",
            ObjectFormat::Wasm => "wasm",
        };
        write!(f, "{format}-ptr{}", self.pointer_width)
    }
}
