pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod frame_source;
pub mod ipc;
pub mod session;
pub mod timing;

pub use config::*;
pub use diagnostics::*;
pub use engine::*;
pub use frame_source::*;
pub use ipc::*;
pub use session::*;
pub use timing::*;
