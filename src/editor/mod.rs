//! Editing session state: dirty tracking, settle detection, media targets
//! and the controller that ties them together.

pub mod controller;
pub mod dirty;
pub mod error;
pub mod settle;
pub mod target;

pub use controller::{DocumentController, SaveOutcome};
pub use dirty::{is_dirty, DirtyTracker, ExtraScalars, Snapshot};
pub use error::DocumentError;
pub use settle::{Clock, ManualClock, SettleDetector, SettleState, SystemClock};
pub use target::{resolve, ActiveEditTarget, TargetId, WritePath};
