use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    ServerExited,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => f.write_str("SIGINT"),
            ShutdownReason::Terminate => f.write_str("SIGTERM"),
            ShutdownReason::ServerExited => f.write_str("server exited"),
        }
    }
}

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<Option<ShutdownReason>>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<Option<ShutdownReason>>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(None);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// Records the first reason only; later triggers are no-ops.
    pub fn trigger_with(&self, reason: ShutdownReason) {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn trigger(&self) {
        self.trigger_with(ShutdownReason::Interrupt);
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        // A closed sender means the owner is gone; treat that as a stop as well.
        let _ = self.receiver.wait_for(Option::is_some).await;
    }

    pub fn is_triggered(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.receiver.borrow()
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc.trigger_with(ShutdownReason::Interrupt);
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                term.trigger_with(ShutdownReason::Terminate);
            }
        });
    }
}
