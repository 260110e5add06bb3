pub mod decode;
pub mod export;
pub mod history;

pub use decode::*;
pub use export::*;
pub use history::*;
