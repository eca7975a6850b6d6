//! Service identification: well-known port names plus product/version from a short banner read.

use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Conventional service name for a TCP port.
pub fn service_name(port: u16) -> Option<&'static str> {
    Some(match port {
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 => "http",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        137 => "netbios-ns",
        139 => "netbios-ssn",
        143 => "imap",
        161 => "snmp",
        179 => "bgp",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        515 => "printer",
        548 => "afp",
        554 => "rtsp",
        587 => "submission",
        631 => "ipp",
        636 => "ldapssl",
        873 => "rsync",
        993 => "imaps",
        995 => "pop3s",
        1080 => "socks",
        1194 => "openvpn",
        1433 => "ms-sql-s",
        1521 => "oracle",
        1723 => "pptp",
        2049 => "nfs",
        2375 | 2376 => "docker",
        3000 => "ppp",
        3128 => "squid-http",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        5000 => "upnp",
        5060 => "sip",
        5432 => "postgresql",
        5672 => "amqp",
        5900 => "vnc",
        5985 | 5986 => "wsman",
        6379 => "redis",
        8000 | 8008 | 8080 | 8081 | 8088 | 8888 => "http-alt",
        8443 | 9443 => "https-alt",
        9090 => "zeus-admin",
        9092 => "kafka",
        9100 => "jetdirect",
        9200 => "elasticsearch",
        11211 => "memcache",
        27017 => "mongodb",
        62078 => "iphone-sync",
        _ => return None,
    })
}

/// Ports answered with an HTTP `HEAD` rather than a passive read.
pub fn is_plain_http(port: u16) -> bool {
    matches!(port, 80 | 3000 | 5000 | 8000 | 8008 | 8080 | 8081 | 8088 | 8888 | 9000 | 9090 | 9200)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub product: Option<String>,
    pub version: Option<String>,
}

/// Read whatever the service volunteers (or answers to `HEAD /`) within `wait`.
/// Any failure simply yields no banner.
pub async fn grab_banner(ip: IpAddr, port: u16, wait: Duration) -> Option<Vec<u8>> {
    let addr = SocketAddr::new(ip, port);
    let mut stream = timeout(wait, TcpStream::connect(addr)).await.ok()?.ok()?;
    if is_plain_http(port) {
        let req = format!("HEAD / HTTP/1.0\r\nHost: {}\r\nUser-Agent: netsurvey/{}\r\nConnection: close\r\n\r\n", ip, env!("CARGO_PKG_VERSION"));
        timeout(wait, stream.write_all(req.as_bytes())).await.ok()?.ok()?;
    }
    let mut buf = vec![0u8; 2048];
    let n = timeout(wait, stream.read(&mut buf)).await.ok()?.ok()?;
    if n == 0 {
        return None;
    }
    buf.truncate(n);
    Some(buf)
}

fn ssh_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^SSH-[\d.]+-([A-Za-z][A-Za-z0-9]*)(?:[_-]([\w.]+))?").expect("static regex"))
}

fn server_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^server:\s*([^/\s\r]+)(?:/([\w.\-]+))?").expect("static regex"))
}

fn greeting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(vsftpd|proftpd|pure-ftpd|filezilla server|microsoft ftp service|postfix|exim|sendmail|microsoft esmtp|dovecot|courier|cyrus)(?:[ /]v?(\d[\w.]*))?")
            .expect("static regex")
    })
}

/// Derive product and version from a raw banner.
pub fn parse_banner(banner: &[u8]) -> ServiceInfo {
    if let Some(info) = parse_mysql_greeting(banner) {
        return info;
    }
    let text = String::from_utf8_lossy(banner);
    let first = text.lines().next().unwrap_or("").trim();

    if let Some(c) = ssh_re().captures(first) {
        return ServiceInfo {
            product: c.get(1).map(|m| m.as_str().to_string()),
            version: c.get(2).map(|m| m.as_str().to_string()),
        };
    }
    if first.starts_with("HTTP/") {
        return match server_header_re().captures(&text) {
            Some(c) => ServiceInfo {
                product: c.get(1).map(|m| m.as_str().to_string()),
                version: c.get(2).map(|m| m.as_str().to_string()),
            },
            None => ServiceInfo::default(),
        };
    }
    if let Some(c) = greeting_re().captures(first) {
        return ServiceInfo {
            product: c.get(1).map(|m| canonical_product(m.as_str())),
            version: c.get(2).map(|m| m.as_str().trim_end_matches('.').to_string()),
        };
    }
    ServiceInfo::default()
}

fn canonical_product(s: &str) -> String {
    match s.to_ascii_lowercase().as_str() {
        "vsftpd" => "vsftpd".into(),
        "proftpd" => "ProFTPD".into(),
        "pure-ftpd" => "Pure-FTPd".into(),
        "filezilla server" => "FileZilla Server".into(),
        "microsoft ftp service" => "Microsoft ftpd".into(),
        "postfix" => "Postfix smtpd".into(),
        "exim" => "Exim smtpd".into(),
        "sendmail" => "Sendmail".into(),
        "microsoft esmtp" => "Microsoft ESMTP".into(),
        "dovecot" => "Dovecot".into(),
        "courier" => "Courier".into(),
        "cyrus" => "Cyrus".into(),
        _ => s.to_string(),
    }
}

/// MySQL/MariaDB handshake: 4-byte header, protocol 10, then a NUL-terminated server version.
fn parse_mysql_greeting(b: &[u8]) -> Option<ServiceInfo> {
    if b.len() < 6 || b[4] != 0x0a {
        return None;
    }
    let rest = &b[5..];
    let end = rest.iter().position(|&c| c == 0)?;
    let version = std::str::from_utf8(&rest[..end]).ok()?;
    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let product = if version.to_ascii_lowercase().contains("mariadb") { "MariaDB" } else { "MySQL" };
    Some(ServiceInfo { product: Some(product.to_string()), version: Some(version.to_string()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_names() {
        assert_eq!(service_name(22), Some("ssh"));
        assert_eq!(service_name(3389), Some("ms-wbt-server"));
        assert_eq!(service_name(40000), None);
    }

    #[test]
    fn ssh_banner() {
        let info = parse_banner(b"SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13\r\n");
        assert_eq!(info.product.as_deref(), Some("OpenSSH"));
        assert_eq!(info.version.as_deref(), Some("9.6p1"));
        let db = parse_banner(b"SSH-2.0-dropbear_2022.83\r\n");
        assert_eq!(db.product.as_deref(), Some("dropbear"));
    }

    #[test]
    fn http_server_header() {
        let head = b"HTTP/1.1 200 OK\r\nDate: Mon, 01 Jan 2024 00:00:00 GMT\r\nServer: nginx/1.24.0 (Ubuntu)\r\n\r\n";
        let info = parse_banner(head);
        assert_eq!(info.product.as_deref(), Some("nginx"));
        assert_eq!(info.version.as_deref(), Some("1.24.0"));
        let bare = parse_banner(b"HTTP/1.0 404 Not Found\r\n\r\n");
        assert_eq!(bare, ServiceInfo::default());
    }

    #[test]
    fn text_greetings() {
        let ftp = parse_banner(b"220 (vsFTPd 3.0.5)\r\n");
        assert_eq!(ftp.product.as_deref(), Some("vsftpd"));
        assert_eq!(ftp.version.as_deref(), Some("3.0.5"));
        let smtp = parse_banner(b"220 mail.example.org ESMTP Postfix (Debian/GNU)\r\n");
        assert_eq!(smtp.product.as_deref(), Some("Postfix smtpd"));
    }

    #[test]
    fn mysql_handshake() {
        let mut pkt = vec![0x4a, 0x00, 0x00, 0x00, 0x0a];
        pkt.extend_from_slice(b"8.0.35\0rest");
        let info = parse_banner(&pkt);
        assert_eq!(info.product.as_deref(), Some("MySQL"));
        assert_eq!(info.version.as_deref(), Some("8.0.35"));
    }
}
