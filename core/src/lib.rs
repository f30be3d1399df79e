pub mod error;
pub mod reader;
pub mod scope;
pub mod util;
pub mod val;
pub mod vm;

pub use error::{VmError, vm_error};
pub use val::Value;
pub use vm::Environment;
