//! XBee API frame payloads.
//!
//! Every payload shares a leading type byte that identifies the variant;
//! [`XbeePayload::parse`] dispatches on it rather than modeling each payload
//! as a separate trait object, since the set is closed and small.

const AT_COMMAND_REQUEST: u8 = 0x08;
const AT_COMMAND_RESPONSE: u8 = 0x88;
const ZB_TRANSMIT_REQUEST: u8 = 0x10;
const ZB_TRANSMIT_STATUS: u8 = 0x8B;
const ZB_RECEIVE_PACKET: u8 = 0x90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommandRequest {
    pub frame_id: u8,
    pub command: [u8; 2],
    pub parameter: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommandResponse {
    pub frame_id: u8,
    pub command: [u8; 2],
    pub status: u8,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbTransmitRequest {
    pub frame_id: u8,
    pub dest_addr64: u64,
    pub dest_addr16: u16,
    pub broadcast_radius: u8,
    pub options: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbTransmitStatus {
    pub frame_id: u8,
    pub dest_addr16: u16,
    pub tx_retry_count: u8,
    pub delivery_status: u8,
    pub discovery_status: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbReceivePacket {
    pub src_addr64: u64,
    pub src_addr16: u16,
    pub options: u8,
    pub data: Vec<u8>,
}

/// The full set of payloads this crate understands, tagged by their XBee
/// frame type byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XbeePayload {
    AtCommandRequest(AtCommandRequest),
    AtCommandResponse(AtCommandResponse),
    ZbTransmitRequest(ZbTransmitRequest),
    ZbTransmitStatus(ZbTransmitStatus),
    ZbReceivePacket(ZbReceivePacket),
}

impl XbeePayload {
    pub fn format(&self) -> Vec<u8> {
        match self {
            XbeePayload::AtCommandRequest(p) => {
                let mut out = vec![AT_COMMAND_REQUEST, p.frame_id, p.command[0], p.command[1]];
                out.extend_from_slice(&p.parameter);
                out
            }
            XbeePayload::AtCommandResponse(p) => {
                let mut out =
                    vec![AT_COMMAND_RESPONSE, p.frame_id, p.command[0], p.command[1], p.status];
                out.extend_from_slice(&p.value);
                out
            }
            XbeePayload::ZbTransmitRequest(p) => {
                let mut out = vec![ZB_TRANSMIT_REQUEST, p.frame_id];
                out.extend_from_slice(&p.dest_addr64.to_be_bytes());
                out.extend_from_slice(&p.dest_addr16.to_be_bytes());
                out.push(p.broadcast_radius);
                out.push(p.options);
                out.extend_from_slice(&p.data);
                out
            }
            XbeePayload::ZbTransmitStatus(p) => {
                let mut out = vec![ZB_TRANSMIT_STATUS, p.frame_id];
                out.extend_from_slice(&p.dest_addr16.to_be_bytes());
                out.push(p.tx_retry_count);
                out.push(p.delivery_status);
                out.push(p.discovery_status);
                out
            }
            XbeePayload::ZbReceivePacket(p) => {
                let mut out = vec![ZB_RECEIVE_PACKET];
                out.extend_from_slice(&p.src_addr64.to_be_bytes());
                out.extend_from_slice(&p.src_addr16.to_be_bytes());
                out.push(p.options);
                out.extend_from_slice(&p.data);
                out
            }
        }
    }

    /// Parse a payload from a frame body. Returns `None` if the type byte is
    /// unrecognized or the body is too short for the declared type.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let (&type_byte, rest) = buf.split_first()?;
        match type_byte {
            AT_COMMAND_REQUEST => {
                let (frame_id, rest) = take_u8(rest)?;
                let (command, parameter) = take_2(rest)?;
                Some(XbeePayload::AtCommandRequest(AtCommandRequest {
                    frame_id,
                    command,
                    parameter: parameter.to_vec(),
                }))
            }
            AT_COMMAND_RESPONSE => {
                let (frame_id, rest) = take_u8(rest)?;
                let (command, rest) = take_2(rest)?;
                let (status, value) = take_u8(rest)?;
                Some(XbeePayload::AtCommandResponse(AtCommandResponse {
                    frame_id,
                    command,
                    status,
                    value: value.to_vec(),
                }))
            }
            ZB_TRANSMIT_REQUEST => {
                let (frame_id, rest) = take_u8(rest)?;
                let (dest_addr64, rest) = take_u64(rest)?;
                let (dest_addr16, rest) = take_u16(rest)?;
                let (broadcast_radius, rest) = take_u8(rest)?;
                let (options, data) = take_u8(rest)?;
                Some(XbeePayload::ZbTransmitRequest(ZbTransmitRequest {
                    frame_id,
                    dest_addr64,
                    dest_addr16,
                    broadcast_radius,
                    options,
                    data: data.to_vec(),
                }))
            }
            ZB_TRANSMIT_STATUS => {
                let (frame_id, rest) = take_u8(rest)?;
                let (dest_addr16, rest) = take_u16(rest)?;
                let (tx_retry_count, rest) = take_u8(rest)?;
                let (delivery_status, rest) = take_u8(rest)?;
                let (discovery_status, _) = take_u8(rest)?;
                Some(XbeePayload::ZbTransmitStatus(ZbTransmitStatus {
                    frame_id,
                    dest_addr16,
                    tx_retry_count,
                    delivery_status,
                    discovery_status,
                }))
            }
            ZB_RECEIVE_PACKET => {
                let (src_addr64, rest) = take_u64(rest)?;
                let (src_addr16, rest) = take_u16(rest)?;
                let (options, data) = take_u8(rest)?;
                Some(XbeePayload::ZbReceivePacket(ZbReceivePacket {
                    src_addr64,
                    src_addr16,
                    options,
                    data: data.to_vec(),
                }))
            }
            _ => None,
        }
    }
}

fn take_u8(buf: &[u8]) -> Option<(u8, &[u8])> {
    let (&b, rest) = buf.split_first()?;
    Some((b, rest))
}

fn take_2(buf: &[u8]) -> Option<([u8; 2], &[u8])> {
    if buf.len() < 2 {
        return None;
    }
    Some(([buf[0], buf[1]], &buf[2..]))
}

fn take_u16(buf: &[u8]) -> Option<(u16, &[u8])> {
    if buf.len() < 2 {
        return None;
    }
    Some((u16::from_be_bytes([buf[0], buf[1]]), &buf[2..]))
}

fn take_u64(buf: &[u8]) -> Option<(u64, &[u8])> {
    if buf.len() < 8 {
        return None;
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&buf[..8]);
    Some((u64::from_be_bytes(arr), &buf[8..]))
}
