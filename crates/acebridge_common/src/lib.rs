//! AceBridge common library.
//!
//! Observation model, telemetry translation and SHDR framing shared by the
//! bridge daemon. Nothing in this crate performs I/O.

pub mod error;
pub mod observation;
pub mod shdr;
pub mod status;
pub mod translator;

pub use error::{ObservationError, StatusError};
pub use observation::{Observation, ObservationKind, ObservationSet, ObservationValue};
pub use status::RawStatus;
pub use translator::{queried_objects, translate, Reading, FIELD_RULES};
