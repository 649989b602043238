pub mod droid;
pub mod openai_client;
pub mod page_extractor;
pub mod pipeline;
#[cfg(test)]
pub mod testing;

pub use droid::*;
pub use openai_client::*;
pub use page_extractor::*;
pub use pipeline::*;
