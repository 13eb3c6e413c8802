mod output;
pub mod page;
mod server;

pub use output::*;
pub use server::*;
