//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! record/document model, batches and their outcomes, the transport trait,
//! the output configuration and the error taxonomy.
//! Business crates only depend on this crate, never on each other in reverse.
//!
//! ## Ordering model
//! - A batch is an ordered list of documents for one destination
//! - Outcome `i` of a submission result always answers document `i`

mod api;
mod batch;
mod config;
mod destination;
mod error;
mod record;
mod secret;
mod template;
mod transport;

pub use api::{ApiFlavor, ResponseShape};
pub use batch::*;
pub use config::*;
pub use destination::Destination;
pub use error::*;
pub use record::*;
pub use secret::Password;
pub use template::{Template, TemplateError};
pub use transport::{DocumentTransport, LocalDocumentTransport, TransportResponse};
