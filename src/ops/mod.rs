//! Broadcasting and elementwise operations

pub mod broadcast;
pub mod elementwise;

pub use broadcast::*;
pub use elementwise::*;

use crate::error::IngotError;

/// Emit the diagnostic for a recoverable failure and hand the error back.
pub(crate) fn recoverable(err: IngotError) -> IngotError {
    if crate::config::get_config().diagnostics.warn_on_recoverable {
        tracing::warn!("{}", err.user_message());
    }
    err
}
