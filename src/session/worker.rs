use super::command::{Command, CommandKind};
use super::handlers::CommandExecutor;
use super::state::{SessionShared, SessionStatsCounters};
use crossbeam::channel::{self, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, info_span, warn};

const WORKER_THREAD_NAME: &str = "camera-session";

pub(crate) enum QueueItem {
    Run(Command),
    /// Acknowledged once every item queued before it has finished
    Flush(Sender<()>),
}

/// FIFO command queue drained by a single dedicated worker thread
pub struct CommandQueue {
    sender: Sender<QueueItem>,
    shared: Arc<SessionShared>,
}

impl CommandQueue {
    /// Start the worker thread. It exits once every queue handle is dropped.
    pub(crate) fn spawn(
        executor: CommandExecutor,
        shared: Arc<SessionShared>,
    ) -> std::io::Result<(Self, JoinHandle<()>)> {
        let (sender, receiver) = channel::unbounded();

        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(receiver, executor))?;

        Ok((Self { sender, shared }, worker))
    }

    /// Enqueue a command without blocking.
    ///
    /// Returns `false` when a picture is already queued or being captured, or
    /// when the worker has shut down. Everything else is accepted.
    pub fn submit(&self, command: Command) -> bool {
        let kind = command.kind();

        if kind == CommandKind::TakePicture && !self.shared.try_reserve_capture() {
            debug!("Rejecting take_picture: a capture is already pending");
            SessionStatsCounters::increment(&self.shared.counters().duplicate_captures_rejected);
            return false;
        }

        match self.sender.send(QueueItem::Run(command)) {
            Ok(()) => {
                SessionStatsCounters::increment(&self.shared.counters().commands_submitted);
                debug!("Queued {} ({} pending)", kind, self.sender.len());
                true
            }
            Err(_) => {
                if kind == CommandKind::TakePicture {
                    self.shared.release_capture_reservation();
                }
                warn!("Camera session worker has stopped, dropping {}", kind);
                false
            }
        }
    }

    /// Block until every command submitted so far has executed.
    ///
    /// Must not be called from a session callback, which runs on the worker.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.sender.send(QueueItem::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Number of items waiting behind the one executing
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

fn run_worker(receiver: Receiver<QueueItem>, mut executor: CommandExecutor) {
    let span = info_span!("worker");
    let _enter = span.enter();
    info!("Camera session worker started");

    for item in receiver.iter() {
        match item {
            QueueItem::Run(command) => execute(&mut executor, command),
            QueueItem::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    executor.shutdown();
    info!("Camera session worker stopped");
}

fn execute(executor: &mut CommandExecutor, command: Command) {
    let kind = command.kind();
    let waited = SystemTime::now()
        .duration_since(command.issued_at())
        .unwrap_or_default();
    debug!("Executing {} after {:?} in queue", kind, waited);

    let shared = Arc::clone(executor.shared());
    let counters = shared.counters();
    match panic::catch_unwind(AssertUnwindSafe(|| executor.dispatch(command))) {
        Ok(Ok(())) => {
            SessionStatsCounters::increment(&counters.commands_processed);
        }
        Ok(Err(e)) => {
            error!("Command {} failed: {}", kind, e);
            SessionStatsCounters::increment(&counters.commands_failed);
        }
        Err(payload) => {
            error!("Command {} panicked: {}", kind, panic_message(payload.as_ref()));
            SessionStatsCounters::increment(&counters.commands_failed);
            executor.recover_after_panic(kind);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
