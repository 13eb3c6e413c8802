//! Pure domain services: audio framing, roll decoding and device placement.

mod framing;
mod placement;
mod roll_decoder;

pub use framing::*;
pub use placement::*;
pub use roll_decoder::*;
