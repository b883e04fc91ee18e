//! STK push credentials
//!
//! `Password = base64(shortcode ++ passkey ++ timestamp)`, with the timestamp
//! rendered `YYYYMMDDHHMMSS` in East Africa Time (UTC+3).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const EAT_OFFSET_HOURS: i64 = 3;

pub fn timestamp(now: DateTime<Utc>) -> String {
    (now.naive_utc() + TimeDelta::hours(EAT_OFFSET_HOURS))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_east_africa_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 21, 30, 0).unwrap();
        assert_eq!(timestamp(now), "20240102003000");
    }

    #[test]
    fn test_sandbox_password() {
        let password = stk_password(
            "174379",
            "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919",
            "20160216165627",
        );
        assert_eq!(
            password,
            "MTc0Mzc5YmZiMjc5ZjlhYTliZGJjZjE1OGU5N2RkNzFhNDY3Y2QyZTBjODkzMDU5YjEwZjc4ZTZiNzJhZGExZWQyYzkxOTIwMTYwMjE2MTY1NjI3"
        );
    }
}
