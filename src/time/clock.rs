//! Runtime time sources.

use crate::types::Time;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// The runtime's time source.
///
/// Wall time is measured from an anchor taken at construction, so `now`
/// starts at zero for both variants. Virtual time only moves when the lab
/// advances it.
#[derive(Debug)]
pub(crate) enum Clock {
    Wall { anchor: Instant },
    Virtual { now: AtomicU64 },
}

impl Clock {
    pub(crate) fn wall() -> Self {
        Self::Wall {
            anchor: Instant::now(),
        }
    }

    pub(crate) const fn virtual_() -> Self {
        Self::Virtual {
            now: AtomicU64::new(0),
        }
    }

    pub(crate) fn now(&self) -> Time {
        match self {
            Self::Wall { anchor } => {
                let nanos = u64::try_from(anchor.elapsed().as_nanos()).unwrap_or(u64::MAX);
                Time::from_nanos(nanos)
            }
            Self::Virtual { now } => Time::from_nanos(now.load(Ordering::Acquire)),
        }
    }

    /// Advances virtual time to `target` if it is ahead of the current
    /// reading. Monotone: never moves time backwards. No-op on wall clocks.
    pub(crate) fn advance_to(&self, target: Time) {
        if let Self::Virtual { now } = self {
            now.fetch_max(target.as_nanos(), Ordering::AcqRel);
        }
    }
}
