pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod health;
pub mod write;

pub use diagnostics::*;
pub use error::*;
pub use frame::*;
pub use health::*;
pub use write::*;
