/// `load_config` module: loads the YAML settings file and merges secrets from the environment
/// into an [`AppConfig`].
///
/// The settings file carries endpoints, container and blob name, and may carry tenant, client
/// and client secret. The environment always wins over the file, and is the only source for
/// the storage connection string. Missing required values fail here, before any network call is made.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use group_snapshot_core::contract::{BlobTarget, DEFAULT_BLOB_NAME, DEFAULT_CONTAINER};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const TENANT_ID_ENV: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";
pub const STORAGE_CONNECTION_ENV: &str = "AzureWebJobsStorage";

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// A secret value that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(len={})", self.0.len())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directory: DirectorySettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub graph_base_url: String,
    pub authority: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: Secret,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Only required by commands that publish.
    pub connection_string: Option<Secret>,
    pub target: BlobTarget,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    directory: DirectorySection,
    #[serde(default)]
    storage: StorageSection,
}

#[derive(Debug, Default, Deserialize)]
struct DirectorySection {
    graph_base_url: Option<String>,
    authority: Option<String>,
    page_size: Option<u32>,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    container: Option<String>,
    blob_name: Option<String>,
}

/// Loads the YAML settings file and overlays credentials from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid settings file: everything falls back to defaults and env.
    let file: SettingsFile = if config_content.trim().is_empty() {
        SettingsFile::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    let tenant_id = required(TENANT_ID_ENV, file.directory.tenant_id)?;
    let client_id = required(CLIENT_ID_ENV, file.directory.client_id)?;
    let from_file = file
        .directory
        .client_secret
        .filter(|v| !v.trim().is_empty());
    let client_secret = match (env_value(CLIENT_SECRET_ENV), from_file) {
        (Some(secret), _) => {
            info!("{CLIENT_SECRET_ENV} found in env");
            Secret::new(secret)
        }
        (None, Some(secret)) => {
            info!("Client secret taken from the settings file");
            Secret::new(secret)
        }
        (None, None) => {
            error!("{CLIENT_SECRET_ENV} environment variable not set");
            anyhow::bail!("{CLIENT_SECRET_ENV} environment variable not set");
        }
    };
    let connection_string = env_value(STORAGE_CONNECTION_ENV).map(Secret::new);
    if connection_string.is_none() {
        info!("{STORAGE_CONNECTION_ENV} not set; publishing commands will refuse to run");
    }

    let page_size = match file.directory.page_size {
        Some(0) => anyhow::bail!("directory.page_size must be greater than zero"),
        other => other,
    };

    let directory = DirectorySettings {
        graph_base_url: file
            .directory
            .graph_base_url
            .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
        authority: file
            .directory
            .authority
            .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
        tenant_id,
        client_id,
        client_secret,
        page_size,
    };
    let storage = StorageSettings {
        connection_string,
        target: BlobTarget {
            container: file
                .storage
                .container
                .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            blob_name: file
                .storage
                .blob_name
                .unwrap_or_else(|| DEFAULT_BLOB_NAME.to_string()),
        },
    };

    info!(
        graph_base_url = %directory.graph_base_url,
        container = %storage.target.container,
        blob = %storage.target.blob_name,
        "Config loaded and merged successfully"
    );
    Ok(AppConfig { directory, storage })
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(env_name: &str, from_file: Option<String>) -> Result<String> {
    match env_value(env_name).or(from_file.filter(|v| !v.trim().is_empty())) {
        Some(value) => Ok(value),
        None => {
            error!(var = env_name, "Required setting missing");
            anyhow::bail!("{env_name} must be set in the environment or the settings file")
        }
    }
}
