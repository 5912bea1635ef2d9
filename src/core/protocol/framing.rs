//! ASTM and HL7 outer framing.
//!
//! Payloads are opaque text; only the surrounding control bytes depend on the
//! protocol. Frames must match the byte layout expected by LIS peers exactly.

use crate::core::protocol::control::{CR, ETX, FS, STX, VT};
use crate::domain::config::ProtocolKind;

/// ASTM acknowledgment payload sent by auto-respond
pub const ASTM_ACK_PAYLOAD: &str = "ACK";

/// HL7 acknowledgment payload sent by auto-respond
pub const HL7_ACK_PAYLOAD: &str = r"MSH|^~\&|SIM||LIS||20250225||ACK|||2.5";

const ASTM_SAMPLE_RESULT: &str =
    "H|\\^&|||SIM|||||||20250225\rP|1\rO|1||^^^GLU||20250225||||||A\rR|1|^^^GLU|5.5|mmol/L||||F";

const HL7_SAMPLE_RESULT: &str = "MSH|^~\\&|SIM||LIS||20250225||ORU^R01|||2.5\rPID|1||12345||Doe^John\rOBR|1|||^GLUCOSE\rOBX|1|NM|^GLUCOSE||5.5|mmol/L|||F";

/// Wrap `payload` in the control bytes of `protocol`.
///
/// ASTM: `STX payload ETX`. HL7 (MLLP): `VT payload FS CR`.
pub fn frame(protocol: ProtocolKind, payload: &str) -> Vec<u8> {
    let body = payload.as_bytes();
    match protocol {
        ProtocolKind::Astm => {
            let mut framed = Vec::with_capacity(body.len() + 2);
            framed.push(STX);
            framed.extend_from_slice(body);
            framed.push(ETX);
            framed
        }
        ProtocolKind::Hl7 => {
            let mut framed = Vec::with_capacity(body.len() + 3);
            framed.push(VT);
            framed.extend_from_slice(body);
            framed.push(FS);
            framed.push(CR);
            framed
        }
    }
}

/// Unframed acknowledgment sent after every received message when auto-respond is on.
pub fn auto_ack_payload(protocol: ProtocolKind) -> &'static str {
    match protocol {
        ProtocolKind::Astm => ASTM_ACK_PAYLOAD,
        ProtocolKind::Hl7 => HL7_ACK_PAYLOAD,
    }
}

/// Canned outbound messages offered to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTemplate {
    AstmAck,
    Hl7Ack,
    /// Glucose result in the grammar of the session protocol
    SampleResult,
}

impl MessageTemplate {
    pub fn payload(&self, protocol: ProtocolKind) -> &'static str {
        match self {
            MessageTemplate::AstmAck => ASTM_ACK_PAYLOAD,
            MessageTemplate::Hl7Ack => HL7_ACK_PAYLOAD,
            MessageTemplate::SampleResult => match protocol {
                ProtocolKind::Astm => ASTM_SAMPLE_RESULT,
                ProtocolKind::Hl7 => HL7_SAMPLE_RESULT,
            },
        }
    }

    /// Acknowledgment template matching `protocol`
    pub fn ack_for(protocol: ProtocolKind) -> Self {
        match protocol {
            ProtocolKind::Astm => MessageTemplate::AstmAck,
            ProtocolKind::Hl7 => MessageTemplate::Hl7Ack,
        }
    }
}
