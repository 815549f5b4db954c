pub mod env;
pub mod value;
pub mod vm;

pub use env::Env;
pub use value::{Heap, Value, ValueId};
pub use vm::{Vm, EXIT_PAUSED};
