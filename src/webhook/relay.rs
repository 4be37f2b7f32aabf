use async_trait::async_trait;
use tokio::sync::Mutex;

use super::debounce::SignalHandler;
use super::signal::TradeSignal;
use crate::api::Exchange;
use crate::execution::Executor;

/// Hands debounced signals to the executor, one run at a time
pub struct Relay<E> {
    executor: Executor<E>,
    run_lock: Mutex<()>,
}

impl<E: Exchange> Relay<E> {
    pub fn new(executor: Executor<E>) -> Self {
        Self {
            executor,
            run_lock: Mutex::new(()),
        }
    }

    pub fn executor(&self) -> &Executor<E> {
        &self.executor
    }
}

#[async_trait]
impl<E: Exchange + 'static> SignalHandler for Relay<E> {
    async fn handle(&self, signal: TradeSignal) {
        // Runs on the same account must not interleave
        let _guard = self.run_lock.lock().await;

        match self.executor.execute(&signal.instrument, signal.side).await {
            Ok(report) => {
                tracing::info!(
                    instrument = %report.instrument,
                    side = %report.side,
                    quantity = report.quantity,
                    reference_price = report.reference_price,
                    "Success"
                );
            }
            Err(e) => {
                tracing::error!(
                    instrument = %signal.instrument,
                    side = %signal.side,
                    step = ?e.step(),
                    "Rollover failed: {}",
                    e
                );
            }
        }
    }
}
