pub mod checkpoint;
pub mod common;
pub mod fields;
pub mod filter;
pub mod instance;
pub mod prediction;
pub mod template;

pub use checkpoint::*;
pub use common::*;
pub use fields::*;
pub use filter::*;
pub use instance::{AiInstance, AiInstanceUpdate, NewAiInstance};
pub use prediction::*;
pub use template::*;
