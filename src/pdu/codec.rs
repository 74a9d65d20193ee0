//! `tokio_util::codec` wiring for the PDU wire format. Mirrors the shape
//! of the teacher's `SmppCodec` wrapper (a newtype registered with
//! `Framed`) but owns the encode/decode logic directly rather than
//! delegating to an external PDU crate.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::CodecError;
use super::types::*;
use super::{command_id, BindRequest, BindResponse, Command, DeliverSmResp, Pdu, SubmitSm, SubmitSmResp};

/// Frames larger than this are rejected as malformed rather than buffered
/// indefinitely; SMPP v3.4 PDUs are small, well under this bound.
const MAX_FRAME_SIZE: usize = 64 * 1024;
const HEADER_SIZE: usize = 16;

#[derive(Debug, Default)]
pub struct SmppCodec;

impl SmppCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SmppCodec {
    type Item = Command;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>, CodecError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let command_length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if command_length < HEADER_SIZE {
            return Err(CodecError::malformed(format!(
                "command_length {command_length} is smaller than the {HEADER_SIZE}-byte header"
            )));
        }
        if command_length > MAX_FRAME_SIZE {
            return Err(CodecError::malformed(format!(
                "command_length {command_length} exceeds the maximum frame size {MAX_FRAME_SIZE}"
            )));
        }
        if src.len() < command_length {
            src.reserve(command_length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(command_length);
        frame.advance(4); // command_length already consumed above
        let command_id = frame.get_u32();
        let command_status = frame.get_u32();
        let sequence_number = frame.get_u32();

        let pdu = decode_body(command_id, &mut frame)?;

        Ok(Some(Command {
            command_status,
            sequence_number,
            pdu,
        }))
    }
}

impl Encoder<Command> for SmppCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), CodecError> {
        let command_id = item.command_id();
        let mut body = BytesMut::new();
        encode_body(&item.pdu, &mut body)?;

        let command_length = HEADER_SIZE + body.len();
        dst.reserve(command_length);
        dst.put_u32(command_length as u32);
        dst.put_u32(command_id);
        dst.put_u32(item.command_status);
        dst.put_u32(item.sequence_number);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

fn expect_empty(field: &str, frame: &BytesMut) -> Result<(), CodecError> {
    if frame.is_empty() {
        Ok(())
    } else {
        Err(CodecError::malformed(format!(
            "{field} body must be empty, found {} trailing bytes",
            frame.len()
        )))
    }
}

fn decode_bind_request(frame: &mut BytesMut) -> Result<BindRequest, CodecError> {
    let system_id = read_coctet_string(frame)?;
    let password = read_coctet_string(frame)?;
    let system_type = read_coctet_string(frame)?;
    let interface_version = read_u8(frame)?;
    let addr_ton = read_u8(frame)?;
    let addr_npi = read_u8(frame)?;
    let address_range = read_coctet_string(frame)?;
    Ok(BindRequest {
        system_id,
        password,
        system_type,
        interface_version,
        addr_ton,
        addr_npi,
        address_range,
    })
}

fn encode_bind_request(req: &BindRequest, dst: &mut BytesMut) -> Result<(), CodecError> {
    write_coctet_string(dst, "system_id", &req.system_id, MAX_SYSTEM_ID)?;
    write_coctet_string(dst, "password", &req.password, MAX_PASSWORD)?;
    write_coctet_string(dst, "system_type", &req.system_type, MAX_SYSTEM_TYPE)?;
    dst.put_u8(req.interface_version);
    dst.put_u8(req.addr_ton);
    dst.put_u8(req.addr_npi);
    write_coctet_string(dst, "address_range", &req.address_range, MAX_ADDRESS_RANGE)?;
    Ok(())
}

fn decode_bind_response(frame: &mut BytesMut) -> Result<BindResponse, CodecError> {
    let system_id = read_coctet_string(frame)?;
    Ok(BindResponse { system_id })
}

fn encode_bind_response(resp: &BindResponse, dst: &mut BytesMut) -> Result<(), CodecError> {
    write_coctet_string(dst, "system_id", &resp.system_id, MAX_SYSTEM_ID)
}

fn decode_submit_sm(frame: &mut BytesMut) -> Result<SubmitSm, CodecError> {
    let service_type = read_coctet_string(frame)?;
    let source_addr_ton = read_u8(frame)?;
    let source_addr_npi = read_u8(frame)?;
    let source_addr = read_coctet_string(frame)?;
    let dest_addr_ton = read_u8(frame)?;
    let dest_addr_npi = read_u8(frame)?;
    let destination_addr = read_coctet_string(frame)?;
    let esm_class = read_u8(frame)?;
    let protocol_id = read_u8(frame)?;
    let priority_flag = read_u8(frame)?;
    let schedule_delivery_time = read_coctet_string(frame)?;
    let validity_period = read_coctet_string(frame)?;
    let registered_delivery = read_u8(frame)?;
    let replace_if_present_flag = read_u8(frame)?;
    let data_coding = read_u8(frame)?;
    let sm_default_msg_id = read_u8(frame)?;
    let sm_length = read_u8(frame)? as usize;
    let short_message = read_octet_string(frame, sm_length)?;

    Ok(SubmitSm {
        service_type,
        source_addr_ton,
        source_addr_npi,
        source_addr,
        dest_addr_ton,
        dest_addr_npi,
        destination_addr,
        esm_class,
        protocol_id,
        priority_flag,
        schedule_delivery_time,
        validity_period,
        registered_delivery,
        replace_if_present_flag,
        data_coding,
        sm_default_msg_id,
        short_message,
    })
}

fn encode_submit_sm(pdu: &SubmitSm, dst: &mut BytesMut) -> Result<(), CodecError> {
    write_coctet_string(dst, "service_type", &pdu.service_type, MAX_SERVICE_TYPE)?;
    dst.put_u8(pdu.source_addr_ton);
    dst.put_u8(pdu.source_addr_npi);
    write_coctet_string(dst, "source_addr", &pdu.source_addr, MAX_ADDR)?;
    dst.put_u8(pdu.dest_addr_ton);
    dst.put_u8(pdu.dest_addr_npi);
    write_coctet_string(dst, "destination_addr", &pdu.destination_addr, MAX_ADDR)?;
    dst.put_u8(pdu.esm_class);
    dst.put_u8(pdu.protocol_id);
    dst.put_u8(pdu.priority_flag);
    write_coctet_string(
        dst,
        "schedule_delivery_time",
        &pdu.schedule_delivery_time,
        MAX_SCHEDULE_DELIVERY_TIME,
    )?;
    write_coctet_string(
        dst,
        "validity_period",
        &pdu.validity_period,
        MAX_VALIDITY_PERIOD,
    )?;
    dst.put_u8(pdu.registered_delivery);
    dst.put_u8(pdu.replace_if_present_flag);
    dst.put_u8(pdu.data_coding);
    dst.put_u8(pdu.sm_default_msg_id);
    if pdu.short_message.len() > MAX_SHORT_MESSAGE {
        return Err(CodecError::encoding(format!(
            "short_message is {} bytes, max is {MAX_SHORT_MESSAGE}",
            pdu.short_message.len()
        )));
    }
    dst.put_u8(pdu.short_message.len() as u8);
    write_octet_string(dst, "short_message", &pdu.short_message, MAX_SHORT_MESSAGE)?;
    Ok(())
}

fn decode_submit_sm_resp(frame: &mut BytesMut) -> Result<SubmitSmResp, CodecError> {
    let message_id = read_coctet_string(frame)?;
    Ok(SubmitSmResp { message_id })
}

fn encode_submit_sm_resp(resp: &SubmitSmResp, dst: &mut BytesMut) -> Result<(), CodecError> {
    write_coctet_string(dst, "message_id", &resp.message_id, MAX_MESSAGE_ID)
}

fn decode_deliver_sm_resp(frame: &mut BytesMut) -> Result<DeliverSmResp, CodecError> {
    let message_id = read_coctet_string(frame)?;
    Ok(DeliverSmResp { message_id })
}

fn encode_deliver_sm_resp(resp: &DeliverSmResp, dst: &mut BytesMut) -> Result<(), CodecError> {
    write_coctet_string(dst, "message_id", &resp.message_id, MAX_MESSAGE_ID)
}

fn decode_body(cmd_id: u32, frame: &mut BytesMut) -> Result<Pdu, CodecError> {
    use command_id::*;

    let pdu = match cmd_id {
        GENERIC_NACK => {
            expect_empty("generic_nack", frame)?;
            Pdu::GenericNack
        }
        BIND_RECEIVER => Pdu::BindReceiver(decode_bind_request(frame)?),
        BIND_RECEIVER_RESP => Pdu::BindReceiverResp(decode_bind_response(frame)?),
        BIND_TRANSMITTER => Pdu::BindTransmitter(decode_bind_request(frame)?),
        BIND_TRANSMITTER_RESP => Pdu::BindTransmitterResp(decode_bind_response(frame)?),
        BIND_TRANSCEIVER => Pdu::BindTransceiver(decode_bind_request(frame)?),
        BIND_TRANSCEIVER_RESP => Pdu::BindTransceiverResp(decode_bind_response(frame)?),
        UNBIND => {
            expect_empty("unbind", frame)?;
            Pdu::Unbind
        }
        UNBIND_RESP => {
            expect_empty("unbind_resp", frame)?;
            Pdu::UnbindResp
        }
        ENQUIRE_LINK => {
            expect_empty("enquire_link", frame)?;
            Pdu::EnquireLink
        }
        ENQUIRE_LINK_RESP => {
            expect_empty("enquire_link_resp", frame)?;
            Pdu::EnquireLinkResp
        }
        SUBMIT_SM => Pdu::SubmitSm(decode_submit_sm(frame)?),
        SUBMIT_SM_RESP => Pdu::SubmitSmResp(decode_submit_sm_resp(frame)?),
        DELIVER_SM => Pdu::DeliverSm(decode_submit_sm(frame)?),
        DELIVER_SM_RESP => Pdu::DeliverSmResp(decode_deliver_sm_resp(frame)?),
        id if command_id::is_stub(id) => Pdu::Unsupported {
            command_id: id,
            body: frame.split_to(frame.len()).to_vec(),
        },
        id => {
            return Err(CodecError::malformed(format!(
                "unknown command_id 0x{id:08x}"
            )))
        }
    };

    Ok(pdu)
}

fn encode_body(pdu: &Pdu, dst: &mut BytesMut) -> Result<(), CodecError> {
    match pdu {
        Pdu::GenericNack | Pdu::Unbind | Pdu::UnbindResp | Pdu::EnquireLink | Pdu::EnquireLinkResp => {}
        Pdu::BindReceiver(req) | Pdu::BindTransmitter(req) | Pdu::BindTransceiver(req) => {
            encode_bind_request(req, dst)?
        }
        Pdu::BindReceiverResp(resp) | Pdu::BindTransmitterResp(resp) | Pdu::BindTransceiverResp(resp) => {
            encode_bind_response(resp, dst)?
        }
        Pdu::SubmitSm(pdu) | Pdu::DeliverSm(pdu) => encode_submit_sm(pdu, dst)?,
        Pdu::SubmitSmResp(resp) => encode_submit_sm_resp(resp, dst)?,
        Pdu::DeliverSmResp(resp) => encode_deliver_sm_resp(resp, dst)?,
        Pdu::Unsupported { body, .. } => dst.put_slice(body),
    }
    Ok(())
}
