pub mod audio;
pub mod pitch;
pub mod score;
pub mod storage;
pub mod types;

pub use audio::*;
pub use pitch::*;
pub use score::*;
pub use storage::*;
pub use types::*;
