use std::net::IpAddr;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use pkg_constants::network::DEFAULT_POD_NETWORK_CIDR;
use pkg_constants::paths::{DEFAULT_CONFIG, DEFAULT_PKI_DIR};
use pkg_pki::{Bootstrap, BootstrapConfig, PkiStore};
use pkg_types::config::{InitConfigFile, load_config_file};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "kubestrap",
    about = "A minimal Kubernetes cluster bootstrap tool inspired by kubeadm"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set up the Kubernetes control plane certificates and keys
    Init(InitArgs),
}

#[derive(Args, Debug, Default)]
struct InitArgs {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// The IP address the API server will advertise it's listening on
    #[arg(long)]
    advertise_address: Option<String>,

    /// Range of IP addresses for the pod network
    #[arg(long)]
    pod_network_cidr: Option<String>,

    /// Directory for keys and certificates
    #[arg(long)]
    pki_dir: Option<String>,
}

/// Effective `init` settings after merging CLI args, config file and defaults.
#[derive(Debug, PartialEq)]
struct InitSettings {
    advertise_address: IpAddr,
    pod_network_cidr: String,
    pki_dir: String,
}

impl InitSettings {
    /// Merge: CLI args > config file > defaults.
    fn resolve(args: InitArgs, file_cfg: InitConfigFile) -> anyhow::Result<Self> {
        let advertise = args
            .advertise_address
            .or(file_cfg.advertise_address)
            .ok_or_else(|| anyhow!("--advertise-address is required"))?;
        let advertise_address = advertise
            .trim()
            .parse::<IpAddr>()
            .with_context(|| format!("advertise address '{}' is not an IP address", advertise))?;

        Ok(Self {
            advertise_address,
            pod_network_cidr: args
                .pod_network_cidr
                .or(file_cfg.pod_network_cidr)
                .unwrap_or_else(|| DEFAULT_POD_NETWORK_CIDR.to_string()),
            pki_dir: args
                .pki_dir
                .or(file_cfg.pki_dir)
                .unwrap_or_else(|| DEFAULT_PKI_DIR.to_string()),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(args) => init(args),
    }
}

fn init(args: InitArgs) -> anyhow::Result<()> {
    info!("[init] Starting kubestrap init");

    let file_cfg: InitConfigFile = load_config_file(&args.config)?;
    info!("Config file: {}", args.config);
    let settings = InitSettings::resolve(args, file_cfg)?;

    let hostname = nix::unistd::gethostname()
        .context("failed to get hostname")?
        .into_string()
        .map_err(|h| anyhow!("hostname {:?} is not valid UTF-8", h))?;

    info!("  Advertise address: {}", settings.advertise_address);
    info!("  Pod network CIDR:  {}", settings.pod_network_cidr);
    info!("  PKI dir:           {}", settings.pki_dir);
    info!("  Hostname:          {}", hostname);

    let config = BootstrapConfig {
        advertise_address: settings.advertise_address,
        hostname,
    };
    let mut bootstrap = Bootstrap::control_plane(PkiStore::new(&settings.pki_dir), &config);
    let report = bootstrap
        .run()
        .context("[certificate] Certificate creation failed")?;

    info!(
        "[init] Issued {} component certificates into {}",
        report.issued.len(),
        report.store_root.display()
    );
    Ok(())
}
