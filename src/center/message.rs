//! Operator interface messages.
//!
//! Both directions are JSON objects tagged by an `ID` field, e.g.
//! `{"ID": "sendCommand", "dac": 2.0, "dec": -1.5}` inbound and
//! `{"ID": "ExpData", "states": [...]}` outbound.

use serde::{Deserialize, Serialize};

use crate::telemetry::CommandDeltas;
use crate::{LinkError, Result};

/// A command from the operator interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ID")]
pub enum OperatorCommand {
    /// Drive both actuator boards from control deltas in degrees
    #[serde(rename = "sendCommand")]
    SendCommand {
        /// Defaults to the link clock when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_token: Option<u32>,
        #[serde(flatten)]
        deltas: CommandDeltas,
    },

    /// Make the current rig attitude the new zero
    #[serde(rename = "zeroRigAngle")]
    ZeroRigAngle,

    /// Tunnel velocity and differential pressure entered by the operator
    #[serde(rename = "updateAirflow")]
    UpdateAirflow { vel: f64, dp: f64 },

    /// Leave the waiting state and start serving the radio
    #[serde(rename = "start")]
    Start,

    /// Shut the link down
    #[serde(rename = "stop")]
    Stop,
}

impl OperatorCommand {
    /// Parse and validate one raw operator message.
    ///
    /// Errors carry the message's `ID` when it has one.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let id = value.get("ID").and_then(|id| id.as_str()).map(str::to_owned);
        if id.is_none() {
            return Err(LinkError::command_error(None, "missing ID field"));
        }

        let command: Self = serde_json::from_value(value)
            .map_err(|e| LinkError::command_error(id.clone(), e.to_string()))?;

        match &command {
            OperatorCommand::SendCommand { deltas, .. } if !deltas.is_finite() => {
                Err(LinkError::command_error(id, "control deltas must be finite"))
            }
            OperatorCommand::UpdateAirflow { vel, dp } if !(vel.is_finite() && dp.is_finite()) => {
                Err(LinkError::command_error(id, "airflow values must be finite"))
            }
            _ => Ok(command),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A message for the operator interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ID")]
pub enum GuiMessage {
    /// Throttled telemetry state vector
    #[serde(rename = "ExpData")]
    ExpData { states: Vec<f64> },

    /// Log line routed to the operator console
    #[serde(rename = "info")]
    Info { content: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_command_with_partial_deltas() {
        let cmd = OperatorCommand::from_value(json!({"ID": "sendCommand", "dac": 2.0, "drc_cmp": -1.0}))
            .unwrap();
        let OperatorCommand::SendCommand { time_token, deltas } = cmd else {
            panic!("unexpected command {cmd:?}");
        };
        assert_eq!(time_token, None);
        assert_eq!(deltas.dac, 2.0);
        assert_eq!(deltas.drc_cmp, -1.0);
        assert_eq!(deltas.dec, 0.0);
    }

    #[test]
    fn unit_commands_parse() {
        assert_eq!(
            OperatorCommand::from_value(json!({"ID": "zeroRigAngle"})).unwrap(),
            OperatorCommand::ZeroRigAngle
        );
        assert_eq!(OperatorCommand::from_value(json!({"ID": "stop"})).unwrap(), OperatorCommand::Stop);
        assert_eq!(
            OperatorCommand::from_value(json!({"ID": "updateAirflow", "vel": 20.0, "dp": 240.5}))
                .unwrap(),
            OperatorCommand::UpdateAirflow { vel: 20.0, dp: 240.5 }
        );
    }

    #[test]
    fn bad_commands_keep_their_id() {
        let err = OperatorCommand::from_value(json!({"ID": "selfDestruct"})).unwrap_err();
        assert!(matches!(&err, LinkError::Command { id: Some(id), .. } if id == "selfDestruct"));
        assert!(err.is_retryable());

        let err = OperatorCommand::from_value(json!({"ID": "updateAirflow", "vel": "fast"})).unwrap_err();
        assert!(matches!(&err, LinkError::Command { id: Some(id), .. } if id == "updateAirflow"));

        let err = OperatorCommand::from_value(json!({"dac": 1.0})).unwrap_err();
        assert!(matches!(err, LinkError::Command { id: None, .. }));
        assert!(err.to_string().contains("<missing ID>"));
    }

    #[test]
    fn command_roundtrips_through_json() {
        let cmd = OperatorCommand::SendCommand {
            time_token: Some(12),
            deltas: CommandDeltas { dec: -3.0, ..Default::default() },
        };
        let value = cmd.to_value().unwrap();
        assert_eq!(value["ID"], "sendCommand");
        assert_eq!(value["time_token"], 12);
        assert_eq!(OperatorCommand::from_value(value).unwrap(), cmd);
    }

    #[test]
    fn gui_messages_are_tagged() {
        let value = serde_json::to_value(GuiMessage::ExpData { states: vec![1.0, 2.0] }).unwrap();
        assert_eq!(value, json!({"ID": "ExpData", "states": [1.0, 2.0]}));

        let value = serde_json::to_value(GuiMessage::Info { content: "Started.".into() }).unwrap();
        assert_eq!(value, json!({"ID": "info", "content": "Started."}));
    }
}
