pub mod cli;
pub mod config;
pub mod drift;
pub mod error;
pub mod generator;
pub mod memory;
pub mod narrative;
pub mod testing;

pub mod prelude {
    pub use crate::config::NarrativeConfig;
    pub use crate::drift::DriftGenerator;
    pub use crate::error::{NarrativeError, Result};
    pub use crate::generator::{EchoGenerator, ResponseGenerator};
    pub use crate::memory::{
        Entry, FileSnapshotStore, InMemorySnapshotStore, MemoryStore, SnapshotStore,
        SummaryEntry, Tier, TieredMemory,
    };
    pub use crate::narrative::NarrativeSystem;
}
