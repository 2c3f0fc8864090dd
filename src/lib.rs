//! Record store and domain-model core for a single-institution console tool.
//!
//! Everything lives in one JSON document: user records (admins, teachers,
//! students) and subject records. The console menu layer is a separate
//! consumer; it drives this crate through [`ops::Registry`] and owns all
//! prompting and rendering.

pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod ops;
pub mod store;

pub use config::Config;
pub use error::{GateError, OpError, StoreError, ValidationError};
pub use gate::{ActionGate, Session};
pub use model::{Role, Student, Subject, SubjectAnalysis, Teacher, User};
pub use ops::Registry;
pub use store::{Document, Store};
