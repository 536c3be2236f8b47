//! Tracing setup.
//!
//! The operator console shows the link's own log: [`OperatorLogLayer`] turns
//! every INFO-or-above event into a [`GuiMessage::Info`] on the operator queue.
//! A full queue drops the line rather than stalling the emitting task.

use std::fmt::Write as _;

use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::center::GuiMessage;
use crate::{LinkError, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Fails if a global
/// subscriber is already installed.
pub fn init(default_filter: &str, operator: Option<mpsc::Sender<GuiMessage>>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| LinkError::Config { details: format!("log filter: {e}") })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(operator.map(OperatorLogLayer::new))
        .try_init()
        .map_err(|e| LinkError::Config { details: format!("log subscriber: {e}") })
}

/// Forwards INFO, WARN and ERROR events to the operator queue.
pub struct OperatorLogLayer {
    sink: mpsc::Sender<GuiMessage>,
}

impl OperatorLogLayer {
    pub fn new(sink: mpsc::Sender<GuiMessage>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for OperatorLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > Level::INFO {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let content = if *event.metadata().level() == Level::INFO {
            visitor.line
        } else {
            format!("{}: {}", event.metadata().level(), visitor.line)
        };

        // Full or closed queue: the console misses a line, telemetry does not wait.
        let _ = self.sink.try_send(GuiMessage::Info { content });
    }
}

/// Renders the message followed by any extra fields as `name=value`.
#[derive(Default)]
struct LineVisitor {
    line: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.line.insert_str(0, value);
        } else {
            let _ = write!(self.line, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.line.insert_str(0, &format!("{value:?}"));
        } else {
            let _ = write!(self.line, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info};

    fn drain(rx: &mut mpsc::Receiver<GuiMessage>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(GuiMessage::Info { content }) = rx.try_recv() {
            lines.push(content);
        }
        lines
    }

    #[test]
    fn info_and_above_reach_the_operator() {
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = tracing_subscriber::registry().with(OperatorLogLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            debug!("not for the console");
            info!("Waiting for start...");
            info!(records = 3, "Stop Recording to flight.dat");
            error!("Flight record write failed");
        });

        assert_eq!(
            drain(&mut rx),
            vec![
                "Waiting for start...".to_string(),
                "Stop Recording to flight.dat records=3".to_string(),
                "ERROR: Flight record write failed".to_string(),
            ]
        );
    }

    #[test]
    fn full_queue_drops_lines() {
        let (tx, mut rx) = mpsc::channel(1);
        let subscriber = tracing_subscriber::registry().with(OperatorLogLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            for i in 0..5 {
                info!("line {}", i);
            }
        });

        assert_eq!(drain(&mut rx), vec!["line 0".to_string()]);
    }
}
