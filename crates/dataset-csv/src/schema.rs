/// Column order of the persisted dataset. Every append must match it exactly.
pub const COLUMNS: [&str; 9] = [
    "IP",
    "Status",
    "Hostname",
    "MAC Address",
    "Vendor",
    "OS",
    "Open Ports",
    "Services",
    "Timestamp",
];

/// Written by older tooling in place of an empty services cell.
pub const LEGACY_NO_SERVICES: &str = "No services detected";

pub fn header_matches<'a>(found: impl IntoIterator<Item = &'a str>) -> bool {
    let found: Vec<&str> = found.into_iter().collect();
    found.len() == COLUMNS.len() && found.iter().zip(COLUMNS.iter()).all(|(a, b)| a.trim() == *b)
}

pub fn expected_header() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}
