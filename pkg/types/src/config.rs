use serde::{Deserialize, Serialize};

/// `kubestrap init` configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// advertise-address: 192.0.2.10
/// pod-network-cidr: 10.244.0.0/16
/// pki-dir: /etc/kubernetes/pki
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitConfigFile {
    #[serde(default, alias = "advertise-address")]
    pub advertise_address: Option<String>,
    #[serde(default, alias = "pod-network-cidr")]
    pub pod_network_cidr: Option<String>,
    #[serde(default, alias = "pki-dir")]
    pub pki_dir: Option<String>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
