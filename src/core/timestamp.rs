use time::{
    Date, OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::FormatItem,
    format_description::well_known::Rfc3339, macros::format_description,
};

const SPACED_WITH_OFFSET: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);
const SPACED_SUBSECOND: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const SPACED: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_ONLY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const ISO_SECONDS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Parses the timestamp shapes found in exported channel data and legacy rows.
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(value, SPACED_WITH_OFFSET) {
        return Some(dt);
    }
    for format in [SPACED_SUBSECOND, SPACED] {
        if let Ok(dt) = PrimitiveDateTime::parse(value, format) {
            return Some(dt.assume_utc());
        }
    }
    Date::parse(value, DATE_ONLY)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// RFC 3339 in UTC, the representation stored in the database.
pub fn to_rfc3339(dt: OffsetDateTime) -> Result<String, time::error::Format> {
    dt.to_offset(UtcOffset::UTC).format(&Rfc3339)
}

/// `YYYY-MM-DDTHH:MM:SSZ`, whole seconds in UTC.
pub fn to_iso_seconds(dt: OffsetDateTime) -> Result<String, time::error::Format> {
    dt.to_offset(UtcOffset::UTC).format(ISO_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_known_shapes() {
        let expected = datetime!(2024-10-10 12:30:45 UTC);
        assert_eq!(parse_timestamp("2024-10-10T12:30:45Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-10 12:30:45+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-10 15:30:45+03:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-10-10 12:30:45 "), Some(expected));
        assert_eq!(
            parse_timestamp("2024-10-10 12:30:45.5"),
            Some(datetime!(2024-10-10 12:30:45.5 UTC))
        );
        assert_eq!(
            parse_timestamp("2024-10-10"),
            Some(datetime!(2024-10-10 0:00 UTC))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn formats_iso_seconds_in_utc() {
        let dt = datetime!(2024-10-10 15:30:45.75 +03:00);
        assert_eq!(to_iso_seconds(dt).unwrap(), "2024-10-10T12:30:45Z");
    }
}
