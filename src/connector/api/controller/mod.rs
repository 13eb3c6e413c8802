pub mod convert_controller;
pub mod devices_controller;
pub mod transcribe_controller;

pub use convert_controller::ConvertController;
pub use devices_controller::DevicesController;
pub use transcribe_controller::TranscribeController;
