//! Logs stream health transitions.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::StreamHealth;

/// Log degraded/recovered transitions until shutdown or until the stream
/// is dropped.
pub(super) async fn watch_stream_health(
    mut health: watch::Receiver<StreamHealth>,
    shutdown: CancellationToken,
) {
    let mut previous = *health.borrow_and_update();

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break,

            changed = health.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *health.borrow_and_update();
                match (previous, current) {
                    (StreamHealth::Healthy, StreamHealth::Degraded { consecutive_failures }) => {
                        warn!(
                            consecutive_failures,
                            "Stream health degraded; still running and retrying"
                        );
                    }
                    (StreamHealth::Degraded { .. }, StreamHealth::Healthy) => {
                        info!("Stream health recovered");
                    }
                    (_, StreamHealth::Degraded { consecutive_failures }) => {
                        debug!(consecutive_failures, "Stream still degraded");
                    }
                    (StreamHealth::Healthy, StreamHealth::Healthy) => {}
                }
                previous = current;
            }
        }
    }
}
