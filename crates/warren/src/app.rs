//! Multi-site application bootstrap.
//!
//! An [`App`] wires the standard Warren layout together:
//!
//! - a `default` namespace built from the process environment, an optional
//!   `.env` file and the configuration files of the base directory
//! - one namespace per site directory under `sites.directory`, loaded on
//!   first request through a [`DirectoryCollectionLoader`]
//! - logging from the `log` key and the server from the `server` key
//! - the request id, request log and config middlewares, with the namespace
//!   negotiated as configured under the `negotiation` key
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     warren::App::new(".")?
//!         .run(|server| server.register(&MyService))
//!         .await
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use warren_config::{
    Collection, ConfigStore, ConfigWatcher, DirectoryCollectionLoader, DirectoryProvider,
    EnvProvider, DEFAULT_NAMESPACE,
};
use warren_middleware::stages::{
    ChainedNegotiator, ConfigMiddleware, HostMapNegotiator, HostNegotiator, RequestIdMiddleware,
    RequestLogMiddleware,
};
use warren_server::{Server, ServerConfig, ServerError};
use warren_telemetry::{init_logging, LogConfig};

/// Configuration key of [`SitesConfig`] in the default namespace.
pub const SITES_CONFIG_KEY: &str = "sites";

/// Configuration key of [`NegotiationConfig`] in the default namespace.
pub const NEGOTIATION_CONFIG_KEY: &str = "negotiation";

/// Where site namespaces come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    /// Directory holding one subdirectory per site, relative to the base
    /// directory unless absolute.
    pub directory: String,
    /// Refuses writes to site configuration files.
    pub read_only: bool,
    /// Namespace to site directory redirections.
    pub aliases: HashMap<String, String>,
    /// Refreshes the store when configuration files change.
    pub hot_reload: bool,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            directory: "sites".to_string(),
            read_only: false,
            aliases: HashMap::new(),
            hot_reload: false,
        }
    }
}

impl SitesConfig {
    /// Resolves the sites configuration from the default namespace.
    pub fn from_store(store: &ConfigStore) -> anyhow::Result<Self> {
        store.try_register_schema::<Self>(SITES_CONFIG_KEY)?;
        let Some(config) = store.get(DEFAULT_NAMESPACE) else {
            return Ok(Self::default());
        };
        Ok(config.get::<Self>(SITES_CONFIG_KEY)?.unwrap_or_default())
    }

    fn resolve_directory(&self, basedir: &Path) -> PathBuf {
        let dir = Path::new(&self.directory);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            basedir.join(dir)
        }
    }
}

/// How requests are mapped to namespaces.
///
/// Hosts listed in `host_map` go to their mapped namespace. Every other host
/// is its own namespace, without the port when `skip_port` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Exact `Host` value to namespace.
    pub host_map: HashMap<String, String>,
    /// Drops the `:port` suffix before using the host as a namespace.
    pub skip_port: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            host_map: HashMap::new(),
            skip_port: true,
        }
    }
}

impl NegotiationConfig {
    /// Resolves the negotiation configuration from the default namespace.
    pub fn from_store(store: &ConfigStore) -> anyhow::Result<Self> {
        store.try_register_schema::<Self>(NEGOTIATION_CONFIG_KEY)?;
        let Some(config) = store.get(DEFAULT_NAMESPACE) else {
            return Ok(Self::default());
        };
        Ok(config.get::<Self>(NEGOTIATION_CONFIG_KEY)?.unwrap_or_default())
    }

    /// Builds the negotiator chain: the host map first, then the host.
    pub fn negotiator(&self) -> ChainedNegotiator {
        let mut chain = ChainedNegotiator::new();
        if !self.host_map.is_empty() {
            let hosts = HostMapNegotiator::new();
            for (host, namespace) in &self.host_map {
                hosts.add(host.clone(), namespace.clone());
            }
            chain.add(Arc::new(hosts));
        }
        chain.with(HostNegotiator {
            skip_port: self.skip_port,
        })
    }
}

/// Builds the default collection of `basedir`.
///
/// Providers are consulted in order: process environment, `basedir/.env`
/// when present, then the JSON, YAML and TOML files of `basedir`.
pub fn default_collection(basedir: &Path) -> anyhow::Result<Collection> {
    let collection = Collection::new().with_provider(EnvProvider::new());

    let dotenv = basedir.join(".env");
    if dotenv.is_file() {
        let provider = EnvProvider::from_dotenv(&dotenv)
            .with_context(|| format!("failed to read {}", dotenv.display()))?;
        collection.add_provider(Arc::new(provider));
    }

    Ok(collection.with_provider(DirectoryProvider::with_default_file_types(basedir)))
}

/// A configured, not yet running, multi-site application.
#[derive(Debug)]
pub struct App {
    basedir: PathBuf,
    store: ConfigStore,
    sites: SitesConfig,
    negotiation: NegotiationConfig,
}

impl App {
    /// Creates an application rooted at `basedir`.
    pub fn new(basedir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let basedir = basedir.into();
        let store = ConfigStore::new();
        store.add_collection(DEFAULT_NAMESPACE, default_collection(&basedir)?);

        let sites = SitesConfig::from_store(&store).context("invalid sites configuration")?;
        let mut loader = DirectoryCollectionLoader::new(sites.resolve_directory(&basedir))
            .read_only(sites.read_only);
        for (namespace, target) in &sites.aliases {
            loader = loader.with_alias(namespace.clone(), target.clone());
        }
        store.add_collection_loader(loader);

        let negotiation =
            NegotiationConfig::from_store(&store).context("invalid negotiation configuration")?;

        Ok(Self {
            basedir,
            store,
            sites,
            negotiation,
        })
    }

    /// The application's configuration store.
    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Resolved sites configuration.
    #[must_use]
    pub fn sites(&self) -> &SitesConfig {
        &self.sites
    }

    /// Resolved negotiation configuration.
    #[must_use]
    pub fn negotiation(&self) -> &NegotiationConfig {
        &self.negotiation
    }

    /// Installs the global logging subscriber from the `log` key.
    pub fn init_logging(&self) -> anyhow::Result<()> {
        let config = LogConfig::from_store(&self.store)?;
        init_logging(&config)?;
        Ok(())
    }

    /// Builds the server with the standard middlewares and lets `configure`
    /// register services, routes and extra middlewares.
    pub fn build<F>(&self, configure: F) -> anyhow::Result<Server>
    where
        F: FnOnce(&mut Server) -> Result<(), ServerError>,
    {
        let config = ServerConfig::from_store(&self.store).context("invalid server configuration")?;
        let mut server = Server::new(config, self.store.clone());
        server.use_middleware(Arc::new(RequestIdMiddleware::new()))?;
        server.use_middleware(Arc::new(RequestLogMiddleware::new()))?;
        server.use_middleware(Arc::new(ConfigMiddleware::new(
            self.store.clone(),
            self.negotiation.negotiator(),
        )))?;
        configure(&mut server)?;
        Ok(server)
    }

    /// Builds the server and runs it until a shutdown signal.
    ///
    /// Logging is initialized first; an already installed subscriber is kept.
    pub async fn run<F>(self, configure: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Server) -> Result<(), ServerError>,
    {
        if let Err(e) = self.init_logging() {
            tracing::debug!(error = %e, "keeping existing logging setup");
        }

        let server = self.build(configure)?;
        tracing::info!(
            addr = %server.config().http_addr(),
            basedir = %self.basedir.display(),
            services = ?server.services(),
            "starting warren"
        );

        if self.sites.hot_reload {
            self.spawn_watcher()?;
        }

        server.run().await?;
        tracing::info!("warren stopped");
        Ok(())
    }

    fn spawn_watcher(&self) -> anyhow::Result<()> {
        let mut watcher = ConfigWatcher::builder(self.store.clone())
            .watch_path(&self.basedir)?
            .build()
            .context("failed to start configuration watcher")?;

        tokio::spawn(async move {
            if let Err(e) = watcher.run().await {
                tracing::error!(error = %e, "configuration watcher stopped");
            }
        });
        Ok(())
    }
}
