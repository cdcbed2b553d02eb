//! Anti-cheating visibility tracking

pub mod clock;
mod registry;
pub mod storage;
mod visibility;

pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{RegistryTracker, TrackerRegistry};
pub use storage::{MemoryStorage, NamespacedStorage, TrackerStorage};
pub use visibility::{
    storage_key, CheatingData, CheatingRecord, TrackerSettings, Visibility, VisibilityOutcome,
    VisibilityTracker,
};
