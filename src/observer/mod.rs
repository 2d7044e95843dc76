// Observer system: every data-access call flows through a ring pipeline.
// Tenant isolation lives in the security ring, so no store or caller
// re-implements it.

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

// Re-export core types
pub use context::*;
pub use error::*;
pub use implementations::*;
pub use pipeline::*;
pub use traits::*;
