//! The per-session message dispatcher: turns a `submit_sm` into a
//! provider call, a `submit_sm_resp`, and, depending on
//! `registered_delivery`, a synthesized receipt published to the bus.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::bus::{BusMessage, BusPublisher};
use crate::pdu::status::CommandStatus;
use crate::pdu::{Command, DeliverSm, ESM_CLASS_MODE_DEFAULT, ESM_CLASS_MODE_MASK, ESM_CLASS_MODE_STORE_AND_FORWARD, ESM_CLASS_RECEIPT, Pdu, SubmitSm, SubmitSmResp};
use crate::provider::{Provider, ShortMessage};
use crate::receipt::{self, DeliveryStatus};
use tokio::sync::mpsc;

/// One-second backoff between `TRY_LATER` retries, per spec.md §4.4
/// ("bounded below by 1s and above by 10s"); a fixed 1s point within
/// that range.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(60);

pub struct Dispatcher {
    provider: Arc<dyn Provider>,
}

impl Dispatcher {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Handles one `submit_sm` end to end: mode validation, response,
    /// provider retry loop and, if warranted, receipt publication. Runs
    /// to completion before the caller reads the connection's next PDU
    /// (the dispatcher does not pipeline).
    pub async fn handle_submit_sm(
        &self,
        sender: &mpsc::UnboundedSender<Command>,
        system_id: &str,
        password: &str,
        bus: &BusPublisher,
        sequence_number: u32,
        pdu: SubmitSm,
    ) {
        let mode = pdu.esm_class & ESM_CLASS_MODE_MASK;
        if mode != ESM_CLASS_MODE_DEFAULT && mode != ESM_CLASS_MODE_STORE_AND_FORWARD {
            let _ = sender.send(generic_nack(sequence_number, CommandStatus::UnknownError));
            return;
        }

        let message_id = receipt::generate_message_id();
        let _ = sender.send(Command::new(
            0,
            sequence_number,
            Pdu::SubmitSmResp(SubmitSmResp {
                message_id: message_id.clone(),
            }),
        ));

        let submitted_at = Local::now();
        let validity_deadline = validity_deadline(Utc::now(), &pdu.validity_period);

        let sm = ShortMessage {
            system_id: system_id.to_string(),
            password: password.to_string(),
            source_addr_ton: pdu.source_addr_ton,
            source_addr_npi: pdu.source_addr_npi,
            source_addr: pdu.source_addr.clone(),
            dest_addr_ton: pdu.dest_addr_ton,
            dest_addr_npi: pdu.dest_addr_npi,
            destination_addr: pdu.destination_addr.clone(),
            body: pdu.short_message.clone(),
        };

        let final_status = loop {
            let status = deliver_guarded(self.provider.as_ref(), &sm).await;
            if status == DeliveryStatus::TryLater && Utc::now() < validity_deadline {
                debug!(system_id, "delivery reported TRY_LATER, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
            break status;
        };

        let registered_delivery = pdu.registered_delivery & 0x03;
        let should_emit = match registered_delivery {
            1 => true,
            2 => final_status != DeliveryStatus::Ok,
            _ => false,
        };

        if !should_emit {
            return;
        }

        let text = String::from_utf8_lossy(&pdu.short_message).into_owned();
        let body = receipt::format_receipt_body(&message_id, final_status, submitted_at, Local::now(), &text);

        let receipt_pdu = DeliverSm {
            service_type: pdu.service_type.clone(),
            source_addr_ton: pdu.dest_addr_ton,
            source_addr_npi: pdu.dest_addr_npi,
            source_addr: pdu.destination_addr.clone(),
            dest_addr_ton: pdu.source_addr_ton,
            dest_addr_npi: pdu.source_addr_npi,
            destination_addr: pdu.source_addr.clone(),
            esm_class: ESM_CLASS_RECEIPT,
            protocol_id: pdu.protocol_id,
            priority_flag: pdu.priority_flag,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 0,
            replace_if_present_flag: 0,
            data_coding: pdu.data_coding,
            sm_default_msg_id: 0,
            short_message: body.into_bytes(),
        };

        // The handler publishes exactly once; local delivery (even for
        // this same worker) happens through its own bus subscriber loop,
        // per the resolved Open Question on self-delivery.
        let command = Command::new(0, 0, Pdu::DeliverSm(receipt_pdu));
        bus.publish(BusMessage {
            system_id: system_id.to_string(),
            receipt: command,
        });
    }
}

pub fn generic_nack(sequence_number: u32, status: CommandStatus) -> Command {
    Command::new(u32::from(status), sequence_number, Pdu::GenericNack)
}

/// Calls `provider.deliver`, catching a panic inside the implementation
/// and mapping it to `GenericError` rather than taking down the worker,
/// per spec.md §4.3/§7 ("a provider crash on `deliver` is treated as
/// `GENERIC_ERROR`").
async fn deliver_guarded(provider: &dyn Provider, sm: &ShortMessage) -> DeliveryStatus {
    match AssertUnwindSafe(provider.deliver(sm)).catch_unwind().await {
        Ok(status) => status,
        Err(_) => {
            warn!("provider panicked during deliver, treating as a generic error");
            DeliveryStatus::GenericError
        }
    }
}

/// Parses the SMPP v3.4 absolute validity period form
/// `YYMMDDhhmmsstnnp` into a UTC deadline. Falls back to `now + 60s` on
/// an empty string or any parse failure, per spec.md §4.4 step 4.
fn validity_deadline(now: DateTime<Utc>, validity_period: &str) -> DateTime<Utc> {
    parse_absolute_validity_period(validity_period).unwrap_or(now + DEFAULT_VALIDITY_WINDOW)
}

fn parse_absolute_validity_period(validity_period: &str) -> Option<DateTime<Utc>> {
    if validity_period.len() != 16 {
        return None;
    }
    let b = validity_period.as_bytes();
    let field = |range: std::ops::Range<usize>| std::str::from_utf8(&b[range]).ok();

    let yy: i32 = field(0..2)?.parse().ok()?;
    let mo: u32 = field(2..4)?.parse().ok()?;
    let dd: u32 = field(4..6)?.parse().ok()?;
    let hh: u32 = field(6..8)?.parse().ok()?;
    let mi: u32 = field(8..10)?.parse().ok()?;
    let ss: u32 = field(10..12)?.parse().ok()?;
    // b[12] is tenths of a second, unused at minute resolution.
    let quarter_hours: i64 = field(13..15)?.parse().ok()?;
    let sign = b[15] as char;
    if sign != '+' && sign != '-' {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(2000 + yy, mo, dd)?;
    let naive = date.and_hms_opt(hh, mi, ss)?;
    let offset = chrono::Duration::minutes(quarter_hours * 15);
    let utc_naive = if sign == '+' { naive - offset } else { naive + offset };
    Some(DateTime::<Utc>::from_naive_utc_and_offset(utc_naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_validity_period_defaults_to_sixty_seconds() {
        let now = Utc::now();
        let deadline = validity_deadline(now, "");
        let delta = deadline - now;
        assert_eq!(delta.num_seconds(), 60);
    }

    #[test]
    fn malformed_validity_period_defaults_to_sixty_seconds() {
        let now = Utc::now();
        let deadline = validity_deadline(now, "not-a-valid-period");
        assert_eq!((deadline - now).num_seconds(), 60);
    }

    #[test]
    fn parses_absolute_validity_period_with_positive_offset() {
        // 2026-07-29 10:00:00, 0 tenths, +2 hours (08 quarter-hours), UTC+2.
        let parsed = parse_absolute_validity_period("260729100000008+").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-07-29 08:00");
    }

    #[test]
    fn parses_absolute_validity_period_with_negative_offset() {
        let parsed = parse_absolute_validity_period("260729100000008-").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-07-29 12:00");
    }

    struct PanickingProvider;

    #[async_trait::async_trait]
    impl Provider for PanickingProvider {
        async fn authenticate(&self, _system_id: &str, _password: &str) -> bool {
            true
        }

        async fn deliver(&self, _sm: &ShortMessage) -> DeliveryStatus {
            panic!("provider blew up");
        }
    }

    #[tokio::test]
    async fn a_panicking_provider_is_reported_as_generic_error() {
        let sm = ShortMessage {
            system_id: "mtc".to_string(),
            password: "pwd".to_string(),
            source_addr_ton: 0,
            source_addr_npi: 0,
            source_addr: String::new(),
            dest_addr_ton: 0,
            dest_addr_npi: 0,
            destination_addr: String::new(),
            body: vec![],
        };
        let status = deliver_guarded(&PanickingProvider, &sm).await;
        assert_eq!(status, DeliveryStatus::GenericError);
    }
}
