//! SMPP v3.4 PDU codec: wire framing, field layout and the typed `Pdu`
//! variants the rest of the engine operates on.
//!
//! Bit-exact per spec.md §4.1: the header is four big-endian u32s
//! (`command_length`, `command_id`, `command_status`, `sequence_number`)
//! and each body layout follows the SMPP v3.4 specification.

pub mod codec;
pub mod error;
pub mod status;
pub mod types;


pub use error::CodecError;
pub use status::CommandStatus;

/// Command IDs for the subset of SMPP v3.4 this gateway understands.
/// Response IDs are the request ID with bit 31 set, except `GENERIC_NACK`
/// which has no corresponding request.
pub mod command_id {
    pub const GENERIC_NACK: u32 = 0x8000_0000;
    pub const BIND_RECEIVER: u32 = 0x0000_0001;
    pub const BIND_RECEIVER_RESP: u32 = 0x8000_0001;
    pub const BIND_TRANSMITTER: u32 = 0x0000_0002;
    pub const BIND_TRANSMITTER_RESP: u32 = 0x8000_0002;
    pub const QUERY_SM: u32 = 0x0000_0003;
    pub const QUERY_SM_RESP: u32 = 0x8000_0003;
    pub const SUBMIT_SM: u32 = 0x0000_0004;
    pub const SUBMIT_SM_RESP: u32 = 0x8000_0004;
    pub const DELIVER_SM: u32 = 0x0000_0005;
    pub const DELIVER_SM_RESP: u32 = 0x8000_0005;
    pub const UNBIND: u32 = 0x0000_0006;
    pub const UNBIND_RESP: u32 = 0x8000_0006;
    pub const REPLACE_SM: u32 = 0x0000_0007;
    pub const REPLACE_SM_RESP: u32 = 0x8000_0007;
    pub const CANCEL_SM: u32 = 0x0000_0008;
    pub const CANCEL_SM_RESP: u32 = 0x8000_0008;
    pub const BIND_TRANSCEIVER: u32 = 0x0000_0009;
    pub const BIND_TRANSCEIVER_RESP: u32 = 0x8000_0009;
    pub const ENQUIRE_LINK: u32 = 0x0000_0015;
    pub const ENQUIRE_LINK_RESP: u32 = 0x8000_0015;
    pub const SUBMIT_MULTI: u32 = 0x0000_0021;
    pub const SUBMIT_MULTI_RESP: u32 = 0x8000_0021;
    pub const DATA_SM: u32 = 0x0000_0103;
    pub const DATA_SM_RESP: u32 = 0x8000_0103;

    /// Command IDs this gateway recognizes but only decodes as an opaque
    /// stub, per spec.md §4.1 ("Codec stubs may be kept for query_sm,
    /// cancel_sm, replace_sm, submit_multi, data_sm").
    pub fn is_stub(id: u32) -> bool {
        matches!(
            id,
            QUERY_SM
                | QUERY_SM_RESP
                | REPLACE_SM
                | REPLACE_SM_RESP
                | CANCEL_SM
                | CANCEL_SM_RESP
                | SUBMIT_MULTI
                | SUBMIT_MULTI_RESP
                | DATA_SM
                | DATA_SM_RESP
        )
    }
}

/// "SMSC Delivery Receipt" bit within `esm_class` (spec.md §4.2).
pub const ESM_CLASS_RECEIPT: u8 = 0x04;

/// `esm_class` messaging-mode mask and the modes the dispatcher accepts
/// (spec.md §4.4 step 2).
pub const ESM_CLASS_MODE_MASK: u8 = 0x03;
pub const ESM_CLASS_MODE_DEFAULT: u8 = 0x00;
pub const ESM_CLASS_MODE_STORE_AND_FORWARD: u8 = 0x03;

/// A fully addressed bind request body (`bind_receiver`, `bind_transmitter`
/// and `bind_transceiver` all share this shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRequest {
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindResponse {
    pub system_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSm {
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSmResp {
    pub message_id: String,
}

/// `deliver_sm` shares `submit_sm`'s field layout in SMPP v3.4.
pub type DeliverSm = SubmitSm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverSmResp {
    pub message_id: String,
}

/// A fully decoded command: the mutable header fields plus the typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command_status: u32,
    pub sequence_number: u32,
    pub pdu: Pdu,
}

impl Command {
    pub fn new(command_status: u32, sequence_number: u32, pdu: Pdu) -> Self {
        Self {
            command_status,
            sequence_number,
            pdu,
        }
    }

    pub fn command_id(&self) -> u32 {
        self.pdu.command_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    GenericNack,
    BindReceiver(BindRequest),
    BindReceiverResp(BindResponse),
    BindTransmitter(BindRequest),
    BindTransmitterResp(BindResponse),
    BindTransceiver(BindRequest),
    BindTransceiverResp(BindResponse),
    Unbind,
    UnbindResp,
    EnquireLink,
    EnquireLinkResp,
    SubmitSm(SubmitSm),
    SubmitSmResp(SubmitSmResp),
    DeliverSm(DeliverSm),
    DeliverSmResp(DeliverSmResp),
    /// A recognized-but-unimplemented command, carried as raw body bytes.
    Unsupported { command_id: u32, body: Vec<u8> },
}

impl Pdu {
    pub fn command_id(&self) -> u32 {
        use command_id::*;
        match self {
            Pdu::GenericNack => GENERIC_NACK,
            Pdu::BindReceiver(_) => BIND_RECEIVER,
            Pdu::BindReceiverResp(_) => BIND_RECEIVER_RESP,
            Pdu::BindTransmitter(_) => BIND_TRANSMITTER,
            Pdu::BindTransmitterResp(_) => BIND_TRANSMITTER_RESP,
            Pdu::BindTransceiver(_) => BIND_TRANSCEIVER,
            Pdu::BindTransceiverResp(_) => BIND_TRANSCEIVER_RESP,
            Pdu::Unbind => UNBIND,
            Pdu::UnbindResp => UNBIND_RESP,
            Pdu::EnquireLink => ENQUIRE_LINK,
            Pdu::EnquireLinkResp => ENQUIRE_LINK_RESP,
            Pdu::SubmitSm(_) => SUBMIT_SM,
            Pdu::SubmitSmResp(_) => SUBMIT_SM_RESP,
            Pdu::DeliverSm(_) => DELIVER_SM,
            Pdu::DeliverSmResp(_) => DELIVER_SM_RESP,
            Pdu::Unsupported { command_id, .. } => *command_id,
        }
    }
}
