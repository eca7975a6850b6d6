//! Hardware vendor lookup by MAC address prefix (OUI), backed by the IEEE registry bundled with `mac_oui`.

use mac_oui::Oui;
use std::sync::OnceLock;
use tracing::warn;

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!(error = ?e, "OUI database unavailable, vendors will be unknown");
                None
            }
        })
        .as_ref()
}

/// Vendor for `mac` when its prefix is registered. Accepts `:`/`-` separated or bare hex.
pub fn lookup_vendor(mac: &str) -> Option<String> {
    let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect::<String>().to_ascii_uppercase();
    if hex.len() != 12 {
        return None;
    }
    let canonical = hex.as_bytes().chunks(2).map(|b| String::from_utf8_lossy(b).into_owned()).collect::<Vec<_>>().join(":");
    match oui_db()?.lookup_by_mac(&canonical) {
        Ok(Some(entry)) => Some(entry.company_name.clone()),
        _ => None,
    }
}
