pub mod message;
pub mod pod;

pub use message::*;
pub use pod::*;
