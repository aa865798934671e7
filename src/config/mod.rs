pub mod types;
pub mod option;
pub mod registry;
pub mod validator;
pub mod resolved;
pub mod loader;

pub use types::*;
pub use option::*;
pub use registry::*;
pub use validator::*;
pub use resolved::*;
pub use loader::*;
