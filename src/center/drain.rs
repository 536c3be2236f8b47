//! Operator command drain.
//!
//! Runs beside the Message Center's processing task. It never touches the
//! telemetry state: it parses operator messages, handles the lifecycle commands
//! itself and forwards everything else to the processing task.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::LinkRequest;
use super::message::OperatorCommand;

pub(super) struct CommandDrain {
    pub inbound: mpsc::Receiver<serde_json::Value>,
    pub requests: mpsc::Sender<LinkRequest>,
    pub ready: watch::Sender<bool>,
    pub cancel: CancellationToken,
    pub poll: Duration,
}

impl CommandDrain {
    pub async fn run(mut self) {
        debug!("Command drain started");
        let mut handled = 0u64;

        while !self.cancel.is_cancelled() {
            let value = match tokio::time::timeout(self.poll, self.inbound.recv()).await {
                Err(_) => continue,
                Ok(None) => {
                    info!("Operator command queue closed");
                    break;
                }
                Ok(Some(value)) => value,
            };

            match OperatorCommand::from_value(value) {
                Ok(command) => {
                    handled += 1;
                    self.dispatch(command);
                }
                Err(e) => error!("{}", e),
            }
        }

        debug!("Command drain ended ({} commands)", handled);
    }

    fn dispatch(&mut self, command: OperatorCommand) {
        let request = match command {
            OperatorCommand::Start => {
                if !self.ready.send_replace(true) {
                    info!("Started.");
                }
                return;
            }
            OperatorCommand::Stop => {
                info!("Stop requested");
                self.cancel.cancel();
                return;
            }
            OperatorCommand::SendCommand { time_token, deltas } => {
                LinkRequest::SendCommand { time_token, deltas }
            }
            OperatorCommand::ZeroRigAngle => LinkRequest::ZeroRig,
            OperatorCommand::UpdateAirflow { vel, dp } => {
                LinkRequest::UpdateAirflow { velocity: vel, differential_pressure: dp }
            }
        };

        if let Err(e) = self.requests.try_send(request) {
            warn!("Dropping operator command: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Harness {
        operator: mpsc::Sender<serde_json::Value>,
        requests: mpsc::Receiver<LinkRequest>,
        ready: watch::Receiver<bool>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_drain(capacity: usize) -> Harness {
        let (operator, inbound) = mpsc::channel(16);
        let (req_tx, requests) = mpsc::channel(capacity);
        let (ready_tx, ready) = watch::channel(false);
        let cancel = CancellationToken::new();
        let drain = CommandDrain {
            inbound,
            requests: req_tx,
            ready: ready_tx,
            cancel: cancel.clone(),
            poll: Duration::from_millis(20),
        };
        Harness { operator, requests, ready, cancel, task: tokio::spawn(drain.run()) }
    }

    #[tokio::test]
    async fn bad_command_does_not_stop_the_drain() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut h = spawn_drain(4);

        h.operator.send(json!({"ID": "noSuchCommand"})).await.unwrap();
        h.operator.send(json!("not even an object")).await.unwrap();
        h.operator.send(json!({"ID": "zeroRigAngle"})).await.unwrap();

        let request = tokio::time::timeout(Duration::from_secs(1), h.requests.recv()).await.unwrap();
        assert!(matches!(request, Some(LinkRequest::ZeroRig)));

        h.cancel.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn start_raises_ready_and_stop_cancels() {
        let mut h = spawn_drain(4);

        h.operator.send(json!({"ID": "start"})).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), h.ready.wait_for(|ready| *ready))
            .await
            .unwrap()
            .unwrap();

        h.operator.send(json!({"ID": "stop"})).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), h.task).await.unwrap().unwrap();
        assert!(h.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn full_request_queue_drops_instead_of_blocking() {
        let mut h = spawn_drain(1);

        for _ in 0..3 {
            h.operator.send(json!({"ID": "zeroRigAngle"})).await.unwrap();
        }
        h.operator.send(json!({"ID": "start"})).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), h.ready.wait_for(|ready| *ready))
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(h.requests.try_recv(), Ok(LinkRequest::ZeroRig)));
        assert!(h.requests.try_recv().is_err());
        h.cancel.cancel();
        h.task.await.unwrap();
    }
}
