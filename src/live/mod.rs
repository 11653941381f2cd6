//! Live fan-out: the per-token session registry and the per-connection
//! update stream fed by it.

pub mod registry;
pub mod stream;

pub use registry::{FanOutReport, SessionRegistry, Subscription};
pub use stream::live_stream;
