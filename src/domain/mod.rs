pub mod context;
pub mod source;
pub mod structured;

pub use context::*;
pub use source::*;
pub use structured::*;
