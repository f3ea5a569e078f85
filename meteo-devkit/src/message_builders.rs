/*!
Builders for test payloads

Well-formed messages go through the real codec; the broken ones are
hand-written so decoders see exactly what a faulty peer would send.
*/

use anyhow::Result;
use meteo_protocol::{encode_distribution, ControlMessage, DistributionMessage, EncodingFormat, Variable};
use serde_json::Value;

pub struct MessageBuilder;

impl MessageBuilder {
    /// Distribution message from `(name, value, unit)` triples.
    pub fn distribution(server_id: &str, encoding: EncodingFormat, readings: &[(&str, f64, &str)]) -> DistributionMessage {
        let variables = readings
            .iter()
            .map(|(name, value, unit)| Variable::new(*name, *value, *unit))
            .collect();
        DistributionMessage::new(server_id, encoding, variables)
    }

    /// Encoded broadcast envelope, ready to put on the wire.
    pub fn distribution_packet(server_id: &str, encoding: EncodingFormat, readings: &[(&str, f64, &str)]) -> Result<String> {
        Ok(encode_distribution(&Self::distribution(server_id, encoding, readings))?)
    }

    /// Control message with parameters taken from a JSON object.
    pub fn control(command: &str, target: &str, parameters: Value) -> ControlMessage {
        let mut msg = ControlMessage::new(command, target);
        if let Value::Object(map) = parameters {
            msg.parameters = map;
        }
        msg
    }

    /// Broadcast payloads every decoder must reject.
    pub fn malformed_packets() -> Vec<&'static str> {
        vec![
            "no separator at all",
            "YAML:serverId: S1",
            "JSON:{\"serverId\":\"S1\"",
            "XML:<distributionMessage messageId=\"x\"><variables>",
            "XML:<distributionMessage messageId=\"x\" timestamp=\"1\" serverId=\"S1\" encodingFormat=\"XML\"><variables><variable name=\"t\"><value>warm</value><unit>C</unit></variable></variables></distributionMessage>",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_protocol::decode_distribution;
    use serde_json::json;

    #[test]
    fn test_packets_decode_and_malformed_ones_do_not() {
        let packet = MessageBuilder::distribution_packet("S3", EncodingFormat::Xml, &[("pressure", 1012.5, "hPa")]).unwrap();
        assert_eq!(decode_distribution(&packet).unwrap().server_id, "S3");
        for raw in MessageBuilder::malformed_packets() {
            assert!(decode_distribution(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_control_copies_parameters() {
        let msg = MessageBuilder::control("SET_FREQUENCY", "S1", json!({"frequency": 750}));
        assert_eq!(msg.parameters["frequency"], 750);
        assert!(MessageBuilder::control("STOP_SERVER_PROCESS", "S1", Value::Null).parameters.is_empty());
    }
}
