//! Tool declarations, the static registry and the shared executor.

mod executor;
mod registry;
mod traits;

pub use executor::{ToolExecutor, failure_message};
pub use registry::{RegistryError, ToolRegistry, ToolRegistryBuilder};
pub use traits::{SchemaTool, Tool};
