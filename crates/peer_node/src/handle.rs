//! NodeHandle - control surface of a running PeerNode

use contracts::{HandGesture, Handedness, Role, SessionId, SyncEvent};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::error::NodeError;
use crate::node::Command;
use crate::report::NodeReport;

/// Handle to a spawned node task
pub struct NodeHandle {
    role: Role,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SyncEvent>,
    task: JoinHandle<NodeReport>,
}

impl NodeHandle {
    pub(crate) fn new(
        role: Role,
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<SyncEvent>,
        task: JoinHandle<NodeReport>,
    ) -> Self {
        Self {
            role,
            commands,
            events,
            task,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// New receiver of sync events; drop it to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Start an alignment session with `trigger_hand` as the trigger hand
    ///
    /// # Errors
    /// The estimator rejected the start, or the node has stopped
    pub async fn start_alignment(&self, trigger_hand: Handedness) -> Result<SessionId, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::StartAlignment {
            trigger_hand,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| NodeError::Stopped)??)
    }

    /// Stop the running session; `false` if none was running
    pub async fn stop_alignment(&self) -> Result<bool, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::StopAlignment { reply }).await?;
        rx.await.map_err(|_| NodeError::Stopped)
    }

    /// Forward a gesture transition from the hand tracker
    pub async fn gesture_changed(
        &self,
        handedness: Handedness,
        old: HandGesture,
        new: HandGesture,
    ) -> Result<(), NodeError> {
        self.request(Command::GestureChanged {
            handedness,
            old,
            new,
        })
        .await
    }

    async fn request(&self, command: Command) -> Result<(), NodeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NodeError::Stopped)
    }

    /// Stop the node and wait for its report
    #[instrument(name = "node_handle_shutdown", skip(self), fields(role = %self.role))]
    pub async fn shutdown(self) -> Result<NodeReport, NodeError> {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Node already stopped");
        }
        match self.task.await {
            Ok(report) => {
                debug!("Node shutdown complete");
                Ok(report)
            }
            Err(e) => {
                error!(error = ?e, "Node task failed");
                Err(NodeError::TaskFailed(e.to_string()))
            }
        }
    }
}
