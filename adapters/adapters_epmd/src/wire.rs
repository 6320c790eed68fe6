//! EPMD request/response framing.
//!
//! Every request epmd accepts is a 2-byte big-endian length prefix followed
//! by a 1-byte request code and code-specific fields; every reply starts
//! with the response code epmd assigns to that request (`ALIVE2_RESP`,
//! `PORT2_RESP`, ...). There's no version negotiation here: this is the
//! local-only protocol between a node and the epmd daemon running on the
//! same host, distinct from the distribution handshake a node runs with a
//! peer node.

pub const DEFAULT_EPMD_PORT: u16 = 4369;

pub const ALIVE2_REQ: u8 = 120;
pub const ALIVE2_RESP: u8 = 121;
pub const PORT_PLEASE2_REQ: u8 = 122;
pub const PORT2_RESP: u8 = 119;
pub const NAMES_REQ: u8 = 110;

/// `NodeType` from `ALIVE2_REQ`/`PORT2_RESP`: whether a node accepts
/// connections from any node (`Normal`) or only from nodes sharing its
/// cookie and started with `-hidden` (`Hidden`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Hidden,
    Normal,
}

impl NodeType {
    fn to_byte(self) -> u8 {
        match self {
            NodeType::Hidden => 72,
            NodeType::Normal => 77,
        }
    }

    fn from_byte(byte: u8) -> Self {
        if byte == 72 {
            NodeType::Hidden
        } else {
            NodeType::Normal
        }
    }
}

/// Build the body of an `ALIVE2_REQ`, not including its 2-byte length prefix.
pub fn encode_alive2_req(node_name: &str, port: u16, node_type: NodeType, highest_version: u16, lowest_version: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(14 + node_name.len());
    body.push(ALIVE2_REQ);
    body.extend_from_slice(&port.to_be_bytes());
    body.push(node_type.to_byte());
    body.push(0); // protocol: tcp/ip
    body.extend_from_slice(&highest_version.to_be_bytes());
    body.extend_from_slice(&lowest_version.to_be_bytes());
    body.extend_from_slice(&(node_name.len() as u16).to_be_bytes());
    body.extend_from_slice(node_name.as_bytes());
    body.extend_from_slice(&0u16.to_be_bytes()); // no extra data
    body
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alive2Response {
    pub creation: u16,
}

pub fn decode_alive2_resp(data: &[u8]) -> Result<Alive2Response, crate::error::EpmdError> {
    use crate::error::EpmdError;
    if data.len() < 4 || data[0] != ALIVE2_RESP {
        return Err(EpmdError::TruncatedReply);
    }
    let result = data[1];
    if result != 0 {
        return Err(EpmdError::RequestRejected(result));
    }
    let creation = u16::from_be_bytes([data[2], data[3]]);
    Ok(Alive2Response { creation })
}

/// Build the body of a `PORT_PLEASE2_REQ`, not including its length prefix.
pub fn encode_port_please2_req(node_name: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + node_name.len());
    body.push(PORT_PLEASE2_REQ);
    body.extend_from_slice(node_name.as_bytes());
    body
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortResponse {
    pub port: u16,
    pub node_type: NodeType,
    pub highest_version: u16,
    pub lowest_version: u16,
}

pub fn decode_port2_resp(data: &[u8]) -> Result<PortResponse, crate::error::EpmdError> {
    use crate::error::EpmdError;
    let &result = data.first().ok_or(EpmdError::TruncatedReply)?;
    if result != 0 {
        return Err(EpmdError::RequestRejected(result));
    }
    if data.len() < 10 {
        return Err(EpmdError::TruncatedReply);
    }
    let port = u16::from_be_bytes([data[1], data[2]]);
    let node_type = NodeType::from_byte(data[3]);
    // data[4] is the protocol byte, always 0 (tcp/ip) in practice.
    let highest_version = u16::from_be_bytes([data[5], data[6]]);
    let lowest_version = u16::from_be_bytes([data[7], data[8]]);
    Ok(PortResponse {
        port,
        node_type,
        highest_version,
        lowest_version,
    })
}

/// Prefix `body` with its own big-endian 16-bit length, as every epmd
/// request requires.
pub fn frame(body: &[u8]) -> Result<Vec<u8>, crate::error::EpmdError> {
    let len: u16 = body
        .len()
        .try_into()
        .map_err(|_| crate::error::EpmdError::NameTooLong)?;
    let mut framed = Vec::with_capacity(2 + body.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(body);
    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alive2_req_layout_matches_the_wire_format() {
        let body = encode_alive2_req("node@host", 9999, NodeType::Normal, 6, 5);
        assert_eq!(body[0], ALIVE2_REQ);
        assert_eq!(u16::from_be_bytes([body[1], body[2]]), 9999);
        assert_eq!(body[3], 77);
        assert_eq!(body[4], 0);
        let name_len = u16::from_be_bytes([body[9], body[10]]) as usize;
        assert_eq!(name_len, "node@host".len());
        assert_eq!(&body[11..11 + name_len], b"node@host");
    }

    #[test]
    fn alive2_resp_decodes_creation() {
        let reply = [ALIVE2_RESP, 0, 0, 7];
        let decoded = decode_alive2_resp(&reply).unwrap();
        assert_eq!(decoded.creation, 7);
    }

    #[test]
    fn alive2_resp_rejection_is_an_error() {
        let reply = [ALIVE2_RESP, 1, 0, 0];
        assert_eq!(decode_alive2_resp(&reply), Err(crate::error::EpmdError::RequestRejected(1)));
    }

    #[test]
    fn port_please2_resp_decodes_port_and_versions() {
        let mut reply = vec![0u8, 0, 0x4e, 0x20, 77, 0, 0, 6, 0, 5];
        reply.extend_from_slice(&0u16.to_be_bytes());
        reply.extend_from_slice(b"node");
        reply.extend_from_slice(&0u16.to_be_bytes());
        let decoded = decode_port2_resp(&reply).unwrap();
        assert_eq!(decoded.port, 0x4e20);
        assert_eq!(decoded.node_type, NodeType::Normal);
        assert_eq!(decoded.highest_version, 6);
        assert_eq!(decoded.lowest_version, 5);
    }

    #[test]
    fn port_please2_resp_not_found_is_an_error() {
        let reply = [1u8];
        assert_eq!(decode_port2_resp(&reply), Err(crate::error::EpmdError::RequestRejected(1)));
    }

    #[test]
    fn frame_prefixes_with_big_endian_length() {
        let framed = frame(&[1, 2, 3]).unwrap();
        assert_eq!(framed, vec![0, 3, 1, 2, 3]);
    }
}
