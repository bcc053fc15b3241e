//! The classifier seam.
//!
//! Turning runtime counters into a Hot/Cold/NotCold verdict is host policy,
//! not profile plumbing, so the matcher takes it as an injected collaborator.

use crate::record::{AllocationType, ProfileCounters};

pub trait AllocTypeOracle {
    fn classify(&self, info: &ProfileCounters) -> AllocationType;
}

impl<F> AllocTypeOracle for F
where
    F: Fn(&ProfileCounters) -> AllocationType,
{
    fn classify(&self, info: &ProfileCounters) -> AllocationType {
        self(info)
    }
}
