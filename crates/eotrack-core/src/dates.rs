use chrono::NaiveDate;

/// Date formats the source has been observed to emit, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",   // 2025-04-08
    "%m/%d/%Y",   // 04/08/2025
    "%B %d, %Y",  // April 8, 2025
    "%b %d, %Y",  // Apr 8, 2025
    "%d %B %Y",   // 8 April 2025
    "%d %b %Y",   // 8 Apr 2025
    "%Y/%m/%d",   // 2025/04/08
    "%d-%B-%Y",   // 8-April-2025
    "%d-%b-%Y",   // 8-Apr-2025
    "%d-%B-%y",   // 8-April-25
    "%d-%b-%y",   // 8-Apr-25
    "%m-%d-%Y",   // 04-08-2025
    "%m.%d.%Y",   // 04.08.2025
];

/// Parse a date string against the accepted calendar formats.
///
/// Returns `None` for blank input or anything no format matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Sort records newest date first; records without a parseable date sort last.
///
/// The sort is stable, so relative order within equal dates (and within the
/// unparseable tail) is preserved.
pub fn sort_newest_first<T>(items: &mut [T], date_of: impl Fn(&T) -> Option<&str>) {
    items.sort_by_key(|item| {
        std::cmp::Reverse(date_of(item).and_then(parse_date))
    });
}
