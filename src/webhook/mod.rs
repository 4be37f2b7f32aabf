pub mod debounce;
pub mod relay;
pub mod server;
pub mod signal;

pub use debounce::{Debouncer, SignalHandler};
pub use relay::Relay;
pub use server::{create_router, serve, AppState};
pub use signal::{SignalGate, SignalRejection, TradeSignal};
