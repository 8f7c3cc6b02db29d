//! kac-device: the collaborators a pipeline talks to besides storage
//!
//! Each concern is a trait so pipelines receive injected implementations;
//! the software implementations here replace reader and display hardware
//! with the console and local files.

pub mod allowlist;
pub mod attest;
pub mod feedback;
pub mod gate;
pub mod sensor;
pub mod viewer;

pub use allowlist::TagAllowList;
pub use attest::{Attestor, SoftwareAttestor};
pub use feedback::{ConsoleFeedback, Feedback};
pub use gate::{ConsoleGate, PresenceGate, Presentation, UNKNOWN_PRINCIPAL};
pub use sensor::{EnvironmentSensor, NoSensor, SnapshotFileSensor};
pub use viewer::{ExportViewer, TextViewer};
