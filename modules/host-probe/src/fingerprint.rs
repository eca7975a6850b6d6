//! Heuristic OS fingerprint from open-port patterns and service banners.

use netsurvey_core::{OsMatch, PortProbe, PortState};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Windows,
    Linux,
    MacOs,
    Ios,
    FreeBsd,
    OpenBsd,
    Network,
}

const LINUX_DISTROS: &[(&str, &str)] = &[
    ("ubuntu", "Ubuntu"),
    ("debian", "Debian"),
    ("centos", "CentOS"),
    ("red hat", "Red Hat"),
    ("rhel", "Red Hat"),
    ("fedora", "Fedora"),
    ("alpine", "Alpine"),
    ("raspbian", "Raspbian"),
];

const WINDOWS_MARKERS: &[&str] = &["microsoft-iis", "microsoft-httpapi", "microsoft esmtp", "microsoft ftp", "(win64)", "(win32)"];

/// Ranked OS candidates, best first. Empty when nothing points anywhere.
pub fn guess_os(ports: &[PortProbe], banners: &[(u16, String)]) -> Vec<OsMatch> {
    let open: Vec<u16> = ports.iter().filter(|p| p.state == PortState::Open).map(|p| p.port).collect();
    let has = |p: u16| open.contains(&p);

    let mut score: HashMap<Family, u32> = HashMap::new();
    let mut bump = |f: Family, n: u32| *score.entry(f).or_default() += n;
    let mut distro: Option<&'static str> = None;
    let mut embedded = false;

    if has(3389) || has(445) || has(135) {
        bump(Family::Windows, 50);
    }
    if has(139) && !has(22) {
        bump(Family::Windows, 10);
    }
    if has(111) || has(631) {
        bump(Family::Linux, 20);
    }
    if has(22) {
        bump(Family::Linux, 10);
    }
    if has(548) {
        bump(Family::MacOs, 50);
    }
    if has(62078) {
        bump(Family::Ios, 70);
    }
    if has(23) || has(179) {
        bump(Family::Network, 40);
    }
    if has(9100) || has(515) {
        bump(Family::Network, 20);
    }

    for (_, banner) in banners {
        let b = banner.to_lowercase();
        if b.starts_with("ssh-") {
            if b.contains("openssh_for_windows") || b.contains("winssh") {
                bump(Family::Windows, 80);
            } else if b.contains("freebsd") {
                bump(Family::FreeBsd, 70);
            } else if b.contains("openbsd") {
                bump(Family::OpenBsd, 60);
            } else if b.contains("dropbear") {
                bump(Family::Linux, 55);
                embedded = true;
            } else if let Some(d) = LINUX_DISTROS.iter().find(|(k, _)| b.contains(k)) {
                bump(Family::Linux, 60);
                distro.get_or_insert(d.1);
            } else if b.contains("openssh") {
                bump(Family::Linux, 25);
            }
            continue;
        }
        if WINDOWS_MARKERS.iter().any(|m| b.contains(m)) {
            bump(Family::Windows, 60);
        } else if let Some(d) = LINUX_DISTROS.iter().find(|(k, _)| b.contains(&format!("({k}")) || b.contains(&format!("{k}/"))) {
            bump(Family::Linux, 45);
            distro.get_or_insert(d.1);
        } else if b.contains("routeros") || b.contains("mikrotik") || b.contains("cisco") {
            bump(Family::Network, 60);
        }
    }

    let mut out: Vec<OsMatch> = score
        .into_iter()
        .filter(|(_, s)| *s > 0)
        .map(|(f, s)| OsMatch { name: family_name(f, distro, embedded), accuracy: s.min(100) as u8 })
        .collect();
    out.sort_by(|a, b| b.accuracy.cmp(&a.accuracy).then_with(|| a.name.cmp(&b.name)));
    out
}

fn family_name(f: Family, distro: Option<&str>, embedded: bool) -> String {
    match f {
        Family::Windows => "Microsoft Windows".into(),
        Family::Linux => match (distro, embedded) {
            (Some(d), _) => format!("Linux ({d})"),
            (None, true) => "Linux (embedded)".into(),
            (None, false) => "Linux".into(),
        },
        Family::MacOs => "Apple macOS".into(),
        Family::Ios => "Apple iOS".into(),
        Family::FreeBsd => "FreeBSD".into(),
        Family::OpenBsd => "OpenBSD".into(),
        Family::Network => "Network device (embedded)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(ports: &[u16]) -> Vec<PortProbe> {
        ports.iter().map(|&p| PortProbe::new(p, PortState::Open)).collect()
    }

    #[test]
    fn nothing_known_means_no_match() {
        assert!(guess_os(&open(&[40000]), &[]).is_empty());
        assert!(guess_os(&[], &[]).is_empty());
    }

    #[test]
    fn windows_port_profile() {
        let m = guess_os(&open(&[135, 139, 445, 3389]), &[]);
        assert_eq!(m[0].name, "Microsoft Windows");
    }

    #[test]
    fn ssh_banner_names_the_distro() {
        let banners = vec![(22, "SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13".to_string())];
        let m = guess_os(&open(&[22, 80]), &banners);
        assert_eq!(m[0].name, "Linux (Ubuntu)");
        assert_eq!(m[0].accuracy, 70);
    }

    #[test]
    fn iis_beats_port_hints() {
        let banners = vec![(80, "HTTP/1.1 200 OK\r\nServer: Microsoft-IIS/10.0\r\n".to_string())];
        let m = guess_os(&open(&[22, 80]), &banners);
        assert_eq!(m[0].name, "Microsoft Windows");
        assert_eq!(m[1].name, "Linux");
    }
}
