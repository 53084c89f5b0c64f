use tokio::sync::watch;

/// Transmitter side of a producer stop signal.
///
/// Stopping is one-way and idempotent: once signalled, the flag stays set.
#[derive(Debug, Clone)]
pub struct StopTx(watch::Sender<bool>);

impl StopTx {
    /// Wraps a watch sender into a [`StopTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Signals the task to stop.
    pub fn stop(&self) {
        // Infallible send so stopping works even after the task dropped its receiver.
        self.0.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Creates a new stop receiver subscription.
    pub fn subscribe(&self) -> StopRx {
        self.0.subscribe()
    }
}

/// Receiver side of a producer stop signal.
pub type StopRx = watch::Receiver<bool>;

/// Creates a new stop channel in the running state.
pub fn create_stop_channel() -> (StopTx, StopRx) {
    let (tx, rx) = watch::channel(false);
    (StopTx::new(tx), rx)
}

/// Resolves once stop is signalled or the transmitter is dropped.
pub async fn stopped(stop_rx: &mut StopRx) {
    // A dropped transmitter means nobody can consume our output anymore.
    let _ = stop_rx.wait_for(|stopped| *stopped).await;
}
