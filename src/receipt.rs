//! Delivery receipt generation: the outcome enum returned by a `Provider`
//! and the ASCII receipt body embedded in a receipt `deliver_sm`.

use chrono::{DateTime, Local};
use uuid::Uuid;

/// Outcome of a `Provider::deliver` call. `TryLater` is the only status
/// the dispatcher retries on; every other variant is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Ok,
    GenericError,
    AuthFailed,
    NoBalance,
    Undeliverable,
    TryLater,
}

impl DeliveryStatus {
    /// Seven-letter `stat:` tag. `GenericError`/`TryLater` only ever reach
    /// the formatter once the dispatcher has given up past the validity
    /// deadline, at which point they are reported as `EXPIRED`.
    pub fn stat(self) -> &'static str {
        match self {
            DeliveryStatus::Ok => "DELIVRD",
            DeliveryStatus::Undeliverable => "UNDELIV",
            DeliveryStatus::AuthFailed | DeliveryStatus::NoBalance => "REJECTD",
            DeliveryStatus::GenericError | DeliveryStatus::TryLater => "EXPIRED",
        }
    }

    fn dlvrd(self) -> u8 {
        matches!(self, DeliveryStatus::Ok) as u8
    }

    fn err(self) -> u8 {
        !matches!(self, DeliveryStatus::Ok) as u8
    }
}

/// First 8 hex characters of a fresh UUIDv4, matching the original
/// source's `str(uuid.uuid4())[:8]`.
pub fn generate_message_id() -> String {
    let id = Uuid::new_v4().to_string();
    id[..8].to_string()
}

/// Formats the ASCII body of a delivery receipt per the fixed field order
/// `id sub dlvrd submit date done date stat err text`.
pub fn format_receipt_body(
    message_id: &str,
    status: DeliveryStatus,
    submit_date: DateTime<Local>,
    done_date: DateTime<Local>,
    text: &str,
) -> String {
    let truncated: String = text.chars().take(20).collect();
    format!(
        "id:{message_id} sub:001 dlvrd:{} submit date:{} done date:{} stat:{} err:{} text:{truncated}",
        status.dlvrd(),
        submit_date.format("%y%m%d%H%M"),
        done_date.format("%y%m%d%H%M"),
        status.stat(),
        status.err(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn message_id_is_eight_lowercase_hex_digits() {
        let id = generate_message_id();
        assert_eq!(id.len(), 8, "message_id must be exactly 8 characters");
        assert!(
            id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
            "message_id {id} must be lowercase hex"
        );
    }

    #[test]
    fn formats_successful_receipt() {
        let body = format_receipt_body(
            "a1b2c3d4",
            DeliveryStatus::Ok,
            ts(2026, 7, 29, 10, 0),
            ts(2026, 7, 29, 10, 1),
            "Hello world!",
        );
        assert_eq!(
            body,
            "id:a1b2c3d4 sub:001 dlvrd:1 submit date:2607291000 done date:2607291001 stat:DELIVRD err:0 text:Hello world!"
        );
    }

    #[test]
    fn truncates_text_to_twenty_bytes() {
        let body = format_receipt_body(
            "a1b2c3d4",
            DeliveryStatus::Ok,
            ts(2026, 7, 29, 10, 0),
            ts(2026, 7, 29, 10, 1),
            "this message body is much longer than twenty characters",
        );
        assert!(body.ends_with("text:this message body is "));
    }

    #[test]
    fn maps_error_statuses_to_stat_tags() {
        assert_eq!(DeliveryStatus::Undeliverable.stat(), "UNDELIV");
        assert_eq!(DeliveryStatus::AuthFailed.stat(), "REJECTD");
        assert_eq!(DeliveryStatus::NoBalance.stat(), "REJECTD");
        assert_eq!(DeliveryStatus::GenericError.stat(), "EXPIRED");
        assert_eq!(DeliveryStatus::TryLater.stat(), "EXPIRED");
    }

    #[test]
    fn dlvrd_and_err_flags_follow_status() {
        assert_eq!(DeliveryStatus::Ok.dlvrd(), 1);
        assert_eq!(DeliveryStatus::Ok.err(), 0);
        assert_eq!(DeliveryStatus::Undeliverable.dlvrd(), 0);
        assert_eq!(DeliveryStatus::Undeliverable.err(), 1);
    }
}
