// src/lib.rs

pub mod aa;
pub mod engine;
pub mod error;
pub mod frame;
pub mod funcs;
pub mod indexer;
pub mod planes;

#[cfg(test)]
mod testing;

pub use engine::{ArgValue, Engine, PluginArgs};
pub use error::{AdaptError, Result};
pub use frame::{ColorFamily, VideoClip, VideoFormat};
pub use indexer::{Indexer, IndexerConfig, IndexerKind};
pub use planes::{Planes, PlanesArg};
