use clap::{Parser, ValueEnum};

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "nginx-status")]
#[command(version)]
#[command(about = "NGINX Plus upstream/stream discovery and Zabbix item push", long_about = None)]
pub struct Cli {
    /// NGINX Plus API host
    #[arg(long)]
    pub host: String,

    /// NGINX Plus API port [default: 8080]
    #[arg(long)]
    pub port: Option<u16>,

    /// NGINX Plus API user (HTTP basic auth)
    #[arg(long, env = "NGINX_STATUS_USER")]
    pub user: Option<String>,

    /// NGINX Plus API password
    #[arg(long, env = "NGINX_STATUS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Type of check
    #[arg(long, value_enum)]
    pub check: Check,

    /// Zabbix host name the pushed items are filed under
    #[arg(long)]
    pub sender: Option<String>,

    /// Zabbix server/proxy trapper host [default: 127.0.0.1]
    #[arg(long)]
    pub zabbix_host: Option<String>,

    /// Zabbix trapper port [default: 10051]
    #[arg(long)]
    pub zabbix_port: Option<u16>,

    /// NGINX Plus API version (the `N` in `/api/N/`) [default: 3]
    #[arg(long)]
    pub api_version: Option<u32>,

    /// Config directory
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Print the item payload instead of pushing it (update_items only)
    #[arg(long)]
    pub dry_run: bool,
}

/// What a single invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Check {
    /// Discovery rows per HTTP upstream peer
    #[value(name = "list_upstreams")]
    ListUpstreams,
    /// Discovery rows per stream upstream peer
    #[value(name = "list_streams")]
    ListStreams,
    /// Discovery rows per HTTP upstream group
    #[value(name = "short_list_upstreams")]
    ShortListUpstreams,
    /// Discovery rows per stream upstream group
    #[value(name = "short_list_streams")]
    ShortListStreams,
    /// Collect all items and push them to Zabbix
    #[value(name = "update_items")]
    UpdateItems,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::ListUpstreams => "list_upstreams",
            Check::ListStreams => "list_streams",
            Check::ShortListUpstreams => "short_list_upstreams",
            Check::ShortListStreams => "short_list_streams",
            Check::UpdateItems => "update_items",
        }
    }

    /// Discovery checks print `{"data": [...]}` on stdout
    pub fn is_discovery(&self) -> bool {
        !matches!(self, Check::UpdateItems)
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Cli {
    /// Command-line values that take precedence over config files and env
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            nginx_host: Some(self.host.clone()),
            nginx_port: self.port,
            nginx_user: self.user.clone(),
            nginx_password: self.password.clone(),
            api_version: self.api_version,
            zabbix_host: self.zabbix_host.clone(),
            zabbix_port: self.zabbix_port,
            sender: self.sender.clone(),
        }
    }
}
