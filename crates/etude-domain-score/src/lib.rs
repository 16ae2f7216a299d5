pub mod cursor;
pub mod model;
pub mod musicxml_import;
pub mod pitch_text;

pub use cursor::*;
pub use model::*;
pub use musicxml_import::*;
pub use pitch_text::*;
