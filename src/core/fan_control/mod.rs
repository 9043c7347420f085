//! HDD fan controller.
//!
//! Data flows one way each cycle:
//!
//! ```text
//! disks.ini + smartctl → DiskCollector → decide() → RuntimeStore → Publisher
//! ```
//!
//! [`orchestrator::PollLoop`] drives the cycle and its side cadences;
//! [`runtime::ControllerRuntime`] hosts it on a tokio runtime.

pub mod curve;
pub mod decision;
pub mod disk_state;
pub mod history;
pub mod liveness;
pub mod orchestrator;
pub mod publisher;
pub mod runtime;
pub mod smart;
pub mod store;

pub use curve::{ControlPoint, CurveMode};
pub use decision::{decide, Decision, DecisionMode, DecisionSource, DecisionState};
pub use disk_state::{DiskCollector, DiskObservation};
pub use orchestrator::PollLoop;
pub use publisher::{Message, MqttPublisher, Publisher};
pub use runtime::{ControllerRuntime, RuntimeOptions};
pub use store::{CycleReport, RuntimeSnapshot, RuntimeStore};
