use super::signal::TradeSignal;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Receives signals once they have survived the debounce window
#[async_trait]
pub trait SignalHandler: Send + Sync + 'static {
    async fn handle(&self, signal: TradeSignal);
}

struct Pending {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<Pending>,
}

/// Last-wins debounce with a single pending slot
///
/// A new signal arriving while another is still waiting cancels the waiting
/// one and restarts the timer. Once a signal has been handed to the handler
/// it is no longer pending and can't be cancelled.
pub struct Debouncer {
    delay: Duration,
    handler: Arc<dyn SignalHandler>,
    slot: Arc<Mutex<Slot>>,
}

impl Debouncer {
    pub fn new(delay: Duration, handler: Arc<dyn SignalHandler>) -> Self {
        Self {
            delay,
            handler,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Queue `signal`, discarding any signal still waiting
    ///
    /// Returns `true` when a pending signal was discarded.
    pub fn submit(&self, signal: TradeSignal) -> bool {
        // Held until the new task is stored so the timer can't fire against a stale slot
        let mut slot = lock(&self.slot);

        let replaced = match slot.pending.take() {
            Some(previous) => {
                previous.task.abort();
                tracing::warn!("Too many trades received. Ignoring earliest, resetting timer.");
                true
            }
            None => false,
        };

        slot.generation += 1;
        let generation = slot.generation;

        let shared = Arc::clone(&self.slot);
        let handler = Arc::clone(&self.handler);
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut slot = lock(&shared);
                match slot.pending {
                    Some(ref pending) if pending.generation == generation => slot.pending = None,
                    _ => return,
                }
            }

            tracing::debug!(
                instrument = %signal.instrument,
                side = %signal.side,
                "Debounce window elapsed, dispatching"
            );
            handler.handle(signal).await;
        });

        slot.pending = Some(Pending { generation, task });
        replaced
    }

    /// A signal is waiting for its timer
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use tokio::sync::mpsc;

    struct ChannelHandler(mpsc::UnboundedSender<TradeSignal>);

    #[async_trait]
    impl SignalHandler for ChannelHandler {
        async fn handle(&self, signal: TradeSignal) {
            let _ = self.0.send(signal);
        }
    }

    fn signal(instrument: &str, side: Side) -> TradeSignal {
        TradeSignal {
            signature: "CHANGE_ME".to_string(),
            strategy: "my_strategy".to_string(),
            instrument: instrument.to_string(),
            side,
            entry: None,
        }
    }

    #[tokio::test]
    async fn test_single_signal_dispatched_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(Duration::from_millis(50), Arc::new(ChannelHandler(tx)));

        assert!(!debouncer.submit(signal("XBTUSD", Side::Buy)));
        assert!(debouncer.is_pending());
        assert!(rx.try_recv().is_err());

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.side, Side::Buy);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_latest_signal_wins() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(Duration::from_millis(100), Arc::new(ChannelHandler(tx)));

        debouncer.submit(signal("XBTUSD", Side::Buy));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(debouncer.submit(signal("XBTUSD", Side::Sell)));

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.side, Side::Sell);

        // The first never shows up
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signals_outside_window_both_dispatch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(Duration::from_millis(20), Arc::new(ChannelHandler(tx)));

        debouncer.submit(signal("XBTUSD", Side::Buy));
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert!(!debouncer.submit(signal("ETHUSD", Side::Sell)));
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.instrument, "XBTUSD");
        assert_eq!(second.instrument, "ETHUSD");
    }
}
