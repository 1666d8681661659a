#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap;
#[cfg(feature = "std")]
use std::collections::HashMap;

/// Measured sizes keyed by item index.
///
/// Survives option changes so that re-applying configuration does not forget what has already
/// been measured.
#[cfg(feature = "std")]
pub(crate) type MeasurementCache = HashMap<usize, u32>;
#[cfg(not(feature = "std"))]
pub(crate) type MeasurementCache = BTreeMap<usize, u32>;
