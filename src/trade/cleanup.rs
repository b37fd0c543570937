//! Order retraction on both venues after trading.

use tracing::{error, info};

use crate::cex::CexSession;
use crate::error::CleanupError;
use crate::logger::Loggers;
use crate::metrics;
use crate::opendex::{remove_opendex_orders, OpenDex};

/// Retract own orders on OpenDEX and the centralized venue.
///
/// Both retractions run to completion even if one fails. Every failure is
/// logged and the first one, OpenDEX before centralized, is returned.
pub async fn cleanup(
    opendex: &dyn OpenDex,
    session: &CexSession,
    loggers: &Loggers,
) -> Result<(), CleanupError> {
    metrics::inc_cleanup_runs();
    info!(parent: &loggers.global, "Retracting orders");

    let (opendex_result, centralized_result) = tokio::join!(
        remove_opendex_orders(opendex, session.pair(), &loggers.opendex),
        session.retract_orders(&loggers.centralized),
    );

    if let Err(e) = &opendex_result {
        error!(parent: &loggers.opendex, error = %e, "Failed to remove OpenDEX orders");
    }
    if let Err(e) = &centralized_result {
        error!(parent: &loggers.centralized, error = %e, "Failed to cancel centralized orders");
    }

    opendex_result.map_err(CleanupError::OpenDex)?;
    centralized_result.map_err(CleanupError::Centralized)?;
    Ok(())
}
