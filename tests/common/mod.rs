pub mod builders;
pub mod memory_store;
pub mod strategies;

pub use builders::*;
pub use memory_store::*;
pub use strategies::*;
