mod address;
pub mod address_parser;
pub mod audit;
mod domain;
pub mod dsn;
mod envelope;
pub mod error;
pub mod logging;
pub mod mail;

pub use address::Address;
pub use domain::Domain;
pub use envelope::Envelope;
pub use mail::{Mail, MailName, ProcessingState};
pub use tracing;
