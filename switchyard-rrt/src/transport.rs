use async_trait::async_trait;
use switchyard_common::{Mail, ProcessingState};

use crate::error::TransportError;

/// Hands mail back to the pipeline
///
/// The mail is moved in, so it is released whether or not injection
/// succeeds.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Inject `mail` as a new message, in `state` if given and in the
    /// mail's own state otherwise
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline refused the mail.
    async fn inject(&self, mail: Mail, state: Option<ProcessingState>) -> Result<(), TransportError>;
}
