//! RLMT probe and bridge-probe frame building and parsing.
//!
//! Two frame families matter to the state machine:
//!
//! - **RLMT probes**: LLC frames to a private multicast group, carrying an
//!   indicator word and the sender's random nonce. Used for the local-port
//!   health check, the directed line check and duplicate-MAC detection.
//! - **Bridge probes**: IEEE 802.1D configuration BPDUs. Only the root-bridge
//!   identifier is consumed, for the segmentation check.

use crate::types::{BridgeId, MacAddress};

/// Ethernet header size (DA + SA + len/type)
pub const ETH_HEADER_SIZE: usize = 14;

/// Minimum Ethernet frame size without FCS
pub const MIN_FRAME_SIZE: usize = 60;

/// LLC SAP of the RLMT probe protocol
pub const RLMT_SAP: u8 = 0x00;

/// LLC control field: unnumbered TEST command
pub const LLC_CTRL_TEST: u8 = 0xE3;

/// LLC SAP of spanning-tree BPDUs
pub const BPDU_SAP: u8 = 0x42;

/// LLC control field: unnumbered information
pub const LLC_CTRL_UI: u8 = 0x03;

/// Indicator bytes marking a frame as an RLMT probe
pub const RLMT_INDICATOR: [u8; 7] = [0x52, 0x4C, 0x4D, 0x54, 0x2E, 0x4E, 0x54]; // "RLMT.NT"

/// Probe kind byte offsets within the RLMT payload
const IND_OFFSET: usize = ETH_HEADER_SIZE + 3;
const KIND_OFFSET: usize = IND_OFFSET + 7;
const NONCE_OFFSET: usize = KIND_OFFSET + 1;

/// RLMT payload length (LLC + indicator + kind + nonce)
pub const RLMT_PAYLOAD_SIZE: usize = 3 + 7 + 1 + 4;

/// Offset of the root-bridge identifier inside a configuration BPDU
/// (LLC 3 + protocol id 2 + version 1 + type 1 + flags 1).
const BPDU_ROOT_OFFSET: usize = ETH_HEADER_SIZE + 8;

/// Frame parsing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Output buffer too small for the frame
    BufferTooSmall,
    /// Frame shorter than its headers claim
    Truncated,
    /// Not a frame this module understands
    NotRlmt,
    /// Unknown probe kind byte
    BadKind,
}

/// Probe kinds carried in RLMT frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProbeKind {
    /// Periodic alive announcement, multicast
    Alive = 1,
    /// Directed "check your tx line" request
    LineCheck = 2,
    /// Answer to a line check
    LineCheckAck = 3,
}

impl ProbeKind {
    /// Parse from byte value
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Alive),
            2 => Some(Self::LineCheck),
            3 => Some(Self::LineCheckAck),
            _ => None,
        }
    }
}

/// What a received frame means to RLMT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// RLMT probe (alive / line check / ack)
    Probe {
        /// Probe kind
        kind: ProbeKind,
        /// Sender's duplicate-detection nonce
        nonce: u32,
    },
    /// Spanning-tree configuration BPDU
    Bpdu {
        /// Advertised root bridge
        root: BridgeId,
    },
    /// Any other traffic (only DA class is interesting)
    Other,
}

/// Parsed view of a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFrame {
    /// Destination address
    pub da: MacAddress,
    /// Source address
    pub sa: MacAddress,
    /// Classification
    pub kind: FrameKind,
}

fn write_eth_header(buffer: &mut [u8], da: &MacAddress, sa: &MacAddress, payload_len: u16) {
    buffer[0..6].copy_from_slice(da.as_bytes());
    buffer[6..12].copy_from_slice(sa.as_bytes());
    buffer[12..14].copy_from_slice(&payload_len.to_be_bytes());
}

/// Build an RLMT probe frame.
///
/// # Arguments
/// * `buffer` - Output buffer (at least [`MIN_FRAME_SIZE`] bytes)
/// * `da` - Destination (RLMT multicast, or a unicast peer for line checks)
/// * `sa` - Sending port's address
/// * `kind` - Probe kind
/// * `nonce` - Sender's duplicate-detection nonce
///
/// # Returns
/// Number of bytes written (always [`MIN_FRAME_SIZE`], zero-padded)
pub fn build_probe(
    buffer: &mut [u8],
    da: MacAddress,
    sa: MacAddress,
    kind: ProbeKind,
    nonce: u32,
) -> Result<usize, FrameError> {
    if buffer.len() < MIN_FRAME_SIZE {
        return Err(FrameError::BufferTooSmall);
    }

    buffer[..MIN_FRAME_SIZE].fill(0);
    write_eth_header(buffer, &da, &sa, RLMT_PAYLOAD_SIZE as u16);

    // LLC header
    buffer[ETH_HEADER_SIZE] = RLMT_SAP;
    buffer[ETH_HEADER_SIZE + 1] = RLMT_SAP;
    buffer[ETH_HEADER_SIZE + 2] = LLC_CTRL_TEST;

    buffer[IND_OFFSET..IND_OFFSET + 7].copy_from_slice(&RLMT_INDICATOR);
    buffer[KIND_OFFSET] = kind as u8;
    buffer[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce.to_be_bytes());

    Ok(MIN_FRAME_SIZE)
}

/// Build a spanning-tree configuration BPDU announcing `root`.
///
/// Standby ports transmit these during the segmentation check so the
/// bridges on each segment answer with their view of the root.
pub fn build_bridge_probe(
    buffer: &mut [u8],
    sa: MacAddress,
    root: BridgeId,
) -> Result<usize, FrameError> {
    if buffer.len() < MIN_FRAME_SIZE {
        return Err(FrameError::BufferTooSmall);
    }

    buffer[..MIN_FRAME_SIZE].fill(0);
    // Config BPDU payload: LLC + proto(2) + version + type + flags + root(8)
    write_eth_header(buffer, &MacAddress::BRIDGE_MCAST, &sa, 38);

    buffer[ETH_HEADER_SIZE] = BPDU_SAP;
    buffer[ETH_HEADER_SIZE + 1] = BPDU_SAP;
    buffer[ETH_HEADER_SIZE + 2] = LLC_CTRL_UI;
    // Protocol id 0x0000, version 0, BPDU type 0 (config), flags 0: already zero
    buffer[BPDU_ROOT_OFFSET..BPDU_ROOT_OFFSET + 8].copy_from_slice(&root.0);

    Ok(MIN_FRAME_SIZE)
}

/// Parse a received frame into what RLMT needs to know about it.
///
/// Frames that are neither RLMT probes nor BPDUs come back as
/// `FrameKind::Other`; the caller still uses the destination class for
/// broadcast timestamping.
pub fn parse(frame: &[u8]) -> Result<ParsedFrame, FrameError> {
    if frame.len() < ETH_HEADER_SIZE {
        return Err(FrameError::Truncated);
    }

    let mut da = [0u8; 6];
    let mut sa = [0u8; 6];
    da.copy_from_slice(&frame[0..6]);
    sa.copy_from_slice(&frame[6..12]);
    let da = MacAddress::new(da);
    let sa = MacAddress::new(sa);

    let kind = if frame.len() >= NONCE_OFFSET + 4
        && frame[ETH_HEADER_SIZE] == RLMT_SAP
        && frame[ETH_HEADER_SIZE + 1] == RLMT_SAP
        && frame[ETH_HEADER_SIZE + 2] == LLC_CTRL_TEST
        && frame[IND_OFFSET..IND_OFFSET + 7] == RLMT_INDICATOR
    {
        let probe_kind = ProbeKind::from_u8(frame[KIND_OFFSET]).ok_or(FrameError::BadKind)?;
        let mut nonce = [0u8; 4];
        nonce.copy_from_slice(&frame[NONCE_OFFSET..NONCE_OFFSET + 4]);
        FrameKind::Probe {
            kind: probe_kind,
            nonce: u32::from_be_bytes(nonce),
        }
    } else if frame.len() >= BPDU_ROOT_OFFSET + 8
        && da == MacAddress::BRIDGE_MCAST
        && frame[ETH_HEADER_SIZE] == BPDU_SAP
        && frame[ETH_HEADER_SIZE + 1] == BPDU_SAP
        && frame[ETH_HEADER_SIZE + 4] == 0x00 // protocol id
        && frame[ETH_HEADER_SIZE + 6] == 0x00 // BPDU type: config
    {
        let mut root = [0u8; 8];
        root.copy_from_slice(&frame[BPDU_ROOT_OFFSET..BPDU_ROOT_OFFSET + 8]);
        FrameKind::Bpdu {
            root: BridgeId::new(root),
        }
    } else {
        FrameKind::Other
    };

    Ok(ParsedFrame { da, sa, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SA: MacAddress = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

    #[test]
    fn test_probe_round_trip() {
        let mut buffer = [0u8; 64];
        let len = build_probe(&mut buffer, MacAddress::RLMT_MCAST, SA, ProbeKind::Alive, 0xDEAD_BEEF)
            .unwrap();
        assert_eq!(len, MIN_FRAME_SIZE);

        let parsed = parse(&buffer[..len]).unwrap();
        assert_eq!(parsed.da, MacAddress::RLMT_MCAST);
        assert_eq!(parsed.sa, SA);
        assert_eq!(
            parsed.kind,
            FrameKind::Probe {
                kind: ProbeKind::Alive,
                nonce: 0xDEAD_BEEF
            }
        );
    }

    #[test]
    fn test_probe_buffer_too_small() {
        let mut buffer = [0u8; 32];
        let result = build_probe(&mut buffer, MacAddress::RLMT_MCAST, SA, ProbeKind::Alive, 1);
        assert_eq!(result, Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_bridge_probe_carries_root() {
        let root = BridgeId::new([0x80, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let mut buffer = [0u8; 64];
        let len = build_bridge_probe(&mut buffer, SA, root).unwrap();

        let parsed = parse(&buffer[..len]).unwrap();
        assert_eq!(parsed.da, MacAddress::BRIDGE_MCAST);
        assert_eq!(parsed.kind, FrameKind::Bpdu { root });
    }

    #[test]
    fn test_plain_traffic_is_other() {
        let mut frame = [0u8; MIN_FRAME_SIZE];
        frame[0..6].copy_from_slice(MacAddress::BROADCAST.as_bytes());
        frame[6..12].copy_from_slice(SA.as_bytes());
        frame[12] = 0x08; // IPv4 ethertype
        let parsed = parse(&frame).unwrap();
        assert_eq!(parsed.kind, FrameKind::Other);
        assert!(parsed.da.is_broadcast());
    }

    #[test]
    fn test_truncated_frame_rejected() {
        assert_eq!(parse(&[0u8; 8]), Err(FrameError::Truncated));
    }

    #[test]
    fn test_bad_probe_kind_rejected() {
        let mut buffer = [0u8; 64];
        let len = build_probe(&mut buffer, MacAddress::RLMT_MCAST, SA, ProbeKind::Alive, 1).unwrap();
        buffer[KIND_OFFSET] = 0x7F;
        assert_eq!(parse(&buffer[..len]), Err(FrameError::BadKind));
    }
}
