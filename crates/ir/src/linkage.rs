use std::fmt;

/// Linkage of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    /// The symbol is defined in the module, and can be used from the outside of the module.
    Public,

    #[default]
    /// The symbol is defined in the module, and can NOT be used from another module.
    Private,

    /// The symbol is defined outside of the module.
    External,

    /// The symbol has a definition available for inspection but the final
    /// definition lives in another module; never emitted from this one.
    AvailableExternally,

    /// The symbol may be merged with an identically-named symbol at link time.
    WeakAny,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::External => write!(f, "external"),
            Self::AvailableExternally => write!(f, "available_externally"),
            Self::WeakAny => write!(f, "weak"),
        }
    }
}
