pub mod options;

pub use options::{ControllerFlags, ControllerOptions, NodeFamily, QDeltaKind, SweeperOptions};
