use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Args;
use owo_colors::OwoColorize;
use url::Url;

use blawg_daemon::http_server::health::Probe;
use blawg_daemon::ServiceConfig;

#[derive(Args, Debug, Clone)]
pub struct Health {
    /// Base URL of the server to probe (default: derived from listen_addr)
    #[arg(long)]
    pub url: Option<Url>,
}

#[derive(Debug)]
pub struct ConfigInfo {
    pub repository: String,
    pub branch: String,
    pub listen_addr: SocketAddr,
    pub database: String,
}

#[derive(Debug)]
pub enum EndpointStatus {
    Ok,
    Unhealthy(String),
    NotReachable,
}

#[derive(Debug)]
pub struct ServerInfo {
    pub url: String,
    pub livez: EndpointStatus,
    pub readyz: EndpointStatus,
}

#[derive(Debug)]
pub struct HealthOutput {
    pub config: Option<ConfigInfo>,
    pub config_error: Option<String>,
    pub server: ServerInfo,
}

impl fmt::Display for HealthOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", "Config".bold())?;
        match &self.config {
            Some(info) => {
                writeln!(f, "  {} {}", "repository:".dimmed(), info.repository)?;
                writeln!(f, "  {} {}", "branch:".dimmed(), info.branch)?;
                writeln!(f, "  {} {}", "listen_addr:".dimmed(), info.listen_addr)?;
                writeln!(f, "  {} {}", "database:".dimmed(), info.database)?;
            }
            None => {
                if let Some(err) = &self.config_error {
                    writeln!(f, "  {} {}", "error:".red(), err)?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "{} ({}):", "Server".bold(), self.server.url)?;

        let status_str = |s: &EndpointStatus| -> String {
            match s {
                EndpointStatus::Ok => "OK".green().to_string(),
                EndpointStatus::Unhealthy(code) => format!("{} ({})", "UNHEALTHY".red(), code),
                EndpointStatus::NotReachable => "NOT REACHABLE".red().to_string(),
            }
        };

        writeln!(
            f,
            "  {} {}",
            "livez:".dimmed(),
            status_str(&self.server.livez)
        )?;
        write!(
            f,
            "  {} {}",
            "readyz:".dimmed(),
            status_str(&self.server.readyz)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("health check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = HealthOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let loaded = ServiceConfig::load(ctx.config_path.as_deref())
            .and_then(|config| config.validate().map(|()| config));

        let (config, config_error, listen_addr) = match loaded {
            Ok(config) => (
                Some(ConfigInfo {
                    repository: format!("{}/{}", config.github.owner, config.github.repo),
                    branch: config.github.branch.clone(),
                    listen_addr: config.listen_addr,
                    database: config
                        .sqlite_path
                        .as_ref()
                        .map(|path| path.display().to_string())
                        .unwrap_or_else(|| "in-memory".to_string()),
                }),
                None,
                config.listen_addr,
            ),
            Err(e) => (None, Some(e.to_string()), ServiceConfig::default().listen_addr),
        };

        let base = match &self.url {
            Some(url) => url.clone(),
            None => local_url(listen_addr)?,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HealthError::Failed(e.to_string()))?;

        let livez = probe(&client, &base, "_status/livez").await;
        let readyz = probe(&client, &base, "_status/readyz").await;

        Ok(HealthOutput {
            config,
            config_error,
            server: ServerInfo {
                url: base.to_string(),
                livez,
                readyz,
            },
        })
    }
}

/// Where a server bound to `addr` can be reached from this host
fn local_url(addr: SocketAddr) -> Result<Url, HealthError> {
    let ip = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    let host = SocketAddr::new(ip, addr.port());
    Url::parse(&format!("http://{}/", host)).map_err(|e| HealthError::Failed(e.to_string()))
}

async fn probe(client: &reqwest::Client, base: &Url, path: &str) -> EndpointStatus {
    let url = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => EndpointStatus::Ok,
        Ok(resp) => {
            let code = resp.status().to_string();
            match resp.json::<Probe>().await.ok().and_then(|probe| probe.reason) {
                Some(reason) => EndpointStatus::Unhealthy(format!("{}: {}", code, reason)),
                None => EndpointStatus::Unhealthy(code),
            }
        }
        Err(_) => EndpointStatus::NotReachable,
    }
}
