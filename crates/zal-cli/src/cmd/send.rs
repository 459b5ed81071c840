use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use zal_core::config::DEFAULT_KEY_PREFIX;
use zal_server::alert::HostMap;
use zal_server::state::{DEFAULT_HOST, DEFAULT_LISTEN_ADDR};
use zal_server::ForwarderConfig;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address the webhook listener binds to
    #[arg(long, env = "ZAL_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub addr: String,

    /// Zabbix server or proxy trapper address
    #[arg(long, env = "ZABBIX_ADDR", default_value = "127.0.0.1:10051")]
    pub zabbix_addr: String,

    /// YAML file mapping Alertmanager receivers to Zabbix hosts
    #[arg(long, env = "ZAL_HOSTS_PATH")]
    pub hosts_path: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    pub key_prefix: String,

    /// Host used when the receiver has no mapping
    #[arg(long, default_value = DEFAULT_HOST)]
    pub default_host: String,

    /// Trapper connection timeout
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    pub timeout: u64,
}

pub fn run(args: SendArgs) -> anyhow::Result<()> {
    let mut config = ForwarderConfig::new(args.zabbix_addr);
    config.key_prefix = args.key_prefix;
    config.default_host = args.default_host;
    config.timeout = Duration::from_secs(args.timeout);
    if let Some(path) = &args.hosts_path {
        config.hosts = HostMap::load(path)?;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(zal_server::serve(&args.addr, config))
}
