use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "netsurvey.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScanConfig {
    pub dataset: Option<PathBuf>,
    pub ports: Option<String>,
    pub top: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub qps: Option<u32>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub workers: Option<usize>,
    pub host_timeout_ms: Option<u64>,
    pub banner_timeout_ms: Option<u64>,
    pub banners: Option<bool>,
    pub resolve_names: Option<bool>,
    pub lookup_mac: Option<bool>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DiscoverConfig {
    pub ports: Option<String>,
    pub timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub qps: Option<u32>,
    pub max_hosts: Option<usize>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ReportConfig {
    pub dataset: Option<PathBuf>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub discover: DiscoverConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Load `path`, or `./netsurvey.yaml` when no path is given and that file exists.
/// An explicitly named file that cannot be read or parsed is an error; a missing default is not.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
    parse_config(&s).map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))
}

pub fn parse_config(s: &str) -> Result<Config, serde_yaml::Error> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(s)
}
