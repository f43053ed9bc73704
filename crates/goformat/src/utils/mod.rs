mod logging;
mod stdin_reader;
mod table_text;
mod text_changes;

pub use logging::*;
pub use stdin_reader::*;
pub use table_text::*;
pub use text_changes::*;
