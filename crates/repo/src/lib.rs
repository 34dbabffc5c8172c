pub mod mem;
pub mod node;
pub mod session;

mod error;

pub use error::Error;
pub use mem::{MemoryRepo, MemorySession};
pub use node::{NodeId, Value};
pub use session::{Repository, Session};
