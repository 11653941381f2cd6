pub mod diagnostics;
pub mod health;
pub mod index;
pub mod new_doc;
pub mod updates;
pub mod write;

pub use diagnostics::*;
pub use health::*;
pub use index::*;
pub use new_doc::*;
pub use updates::*;
pub use write::*;
