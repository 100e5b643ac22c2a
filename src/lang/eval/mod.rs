mod error;
#[allow(clippy::module_inception)]
mod eval;
mod value;

pub use error::EvalError;
pub use eval::Eval;
pub use value::{NativeFunction, Value};
