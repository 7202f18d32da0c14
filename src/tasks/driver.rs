use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

use crate::{
    domain::PageCommand,
    infrastructure::shutdown::ShutdownListener,
    session::{Command, SessionEvent, SessionMachine, SessionStatus},
    tasks::queue::CommandQueue,
};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session driver is not running")]
    SessionClosed,
    #[error("session driver is disabled (empty worklist)")]
    SessionDisabled,
}

#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::UnboundedSender<SessionEvent>,
    status: Arc<Mutex<SessionStatus>>,
}

impl SessionHandle {
    pub fn send(&self, event: SessionEvent) -> Result<(), RelayError> {
        self.sender
            .send(event)
            .map_err(|_| RelayError::SessionClosed)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.lock().clone()
    }
}

/// Pending single-shot arrival timer. Dropping it does not cancel it.
struct ArrivalTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl ArrivalTimer {
    fn arm(generation: u64, after: Duration, sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        let handle = tokio::spawn(async move {
            sleep(after).await;
            let _ = sender.send(SessionEvent::TimerFired { generation });
        });
        Self { generation, handle }
    }

    fn cancel(self) {
        self.handle.abort();
    }
}

/// Owns the [`SessionMachine`] and executes the commands it emits.
///
/// Events are applied one at a time from a single channel, so transitions
/// never overlap.
pub struct SessionDriver {
    machine: SessionMachine,
    commands: Arc<CommandQueue<PageCommand>>,
    sender: mpsc::UnboundedSender<SessionEvent>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    status: Arc<Mutex<SessionStatus>>,
    timer: Option<ArrivalTimer>,
    scheduled: Vec<JoinHandle<()>>,
}

impl SessionDriver {
    pub fn new(
        machine: SessionMachine,
        commands: Arc<CommandQueue<PageCommand>>,
    ) -> (Self, SessionHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(machine.status()));
        let handle = SessionHandle {
            sender: sender.clone(),
            status: status.clone(),
        };
        let driver = Self {
            machine,
            commands,
            sender,
            events,
            status,
            timer: None,
            scheduled: Vec::new(),
        };
        (driver, handle)
    }

    pub fn spawn(self, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_loop(&mut shutdown).await })
    }

    async fn run_loop(mut self, shutdown: &mut ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => break,
                },
                _ = shutdown.notified() => break,
            }
        }

        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        for handle in self.scheduled.drain(..) {
            handle.abort();
        }
        tracing::info!(target: "session", "session driver stopped");
    }

    fn apply(&mut self, event: SessionEvent) {
        tracing::debug!(target: "session", ?event, "applying event");
        let commands = self.machine.handle(event);
        for command in commands {
            self.execute(command);
        }
        *self.status.lock() = self.machine.status();
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Navigate { url } => {
                tracing::info!(target: "relay", url = %url, "navigate");
                self.commands.push(PageCommand::Navigate { url });
            }
            Command::ActivateEndpoint { id } => {
                tracing::info!(target: "relay", endpoint = id, "activate endpoint");
                self.commands.push(PageCommand::ActivateEndpoint { id });
            }
            Command::ArmTimer { generation, after } => {
                if let Some(previous) = self.timer.take() {
                    tracing::debug!(
                        target: "timer",
                        generation = previous.generation,
                        "cancelling previous timer"
                    );
                    previous.cancel();
                }
                self.timer = Some(ArrivalTimer::arm(generation, after, self.sender.clone()));
            }
            Command::CancelTimer => {
                if let Some(timer) = self.timer.take() {
                    timer.cancel();
                }
            }
            Command::Schedule { after, event } => {
                self.scheduled.retain(|handle| !handle.is_finished());
                let sender = self.sender.clone();
                self.scheduled.push(tokio::spawn(async move {
                    sleep(after).await;
                    let _ = sender.send(event);
                }));
            }
            Command::Finished => {
                tracing::info!(target: "session", "scrape run finished");
            }
        }
    }
}
