mod command;
mod device;
mod error;
mod geometry;
mod hdc;
mod recording;
mod selector;
mod ui_tree;

pub mod prelude {
    pub use crate::command::{CommandOutput, CommandRunner, SystemCommandRunner};
    pub use crate::device::{Device, DeviceExt};
    pub use crate::error::{DeviceError, DeviceResult};
    pub use crate::geometry::{Bounds, Point};
    pub use crate::hdc::{HdcConnection, HdcDevice};
    pub use crate::recording::{DeviceAction, RecordingDevice};
    pub use crate::selector::Selector;
    pub use crate::ui_tree::UiNode;
}
