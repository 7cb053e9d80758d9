pub mod error;
pub mod timeline;
pub mod types;

pub use error::*;
pub use timeline::*;
pub use types::*;
