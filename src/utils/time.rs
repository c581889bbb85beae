use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time truncated to the precision stored in the database.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width text form used for every timestamp column, so that
/// comparing the text compares the instants.
pub fn to_sql(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn text_order_follows_time_order() {
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 9, 59, 59).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        assert_eq!(to_sql(&early), "2025-01-01T09:59:59.000000Z");
        assert!(to_sql(&early) < to_sql(&late));
    }
}
