mod artifacts;
mod audio;
mod device;
mod note;
mod score;

pub use artifacts::*;
pub use audio::*;
pub use device::*;
pub use note::*;
pub use score::*;
