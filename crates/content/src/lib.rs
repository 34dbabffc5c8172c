pub mod config;
pub mod mapper;
pub mod props;
pub mod rlp;
pub mod structure;
pub mod types;

mod error;
mod name;

pub use config::MapperConfig;
pub use error::Error;
pub use mapper::{ContentMapper, ContentView, SaveRequest};
pub use structure::{PropertyDef, PropertyKind, Structure, StructureProvider, StructureRegistry};
