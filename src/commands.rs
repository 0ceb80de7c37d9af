//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use understory_client::{backend, ConfigError, EventBus, ViewConfig, ViewSession};
use understory_core::{Diagnostics, Digest, FileIndexEntry, GraphEdge, Issue};
use understory_server::{ServerConfig, ServerState, UnderstoryServer};

/// Flag values that win over the config file.
#[derive(Debug, Default)]
pub struct WatchOverrides {
    pub backend_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub refresh_interval_ms: Option<u64>,
}

impl WatchOverrides {
    /// Apply the flags, then check the merged result.
    fn apply(self, config: &mut ViewConfig) -> Result<(), ConfigError> {
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.refresh_interval_ms {
            config.refresh_interval_ms = ms;
        }
        config.validate()
    }
}

pub async fn watch(config_path: &Path, overrides: WatchOverrides) -> anyhow::Result<()> {
    let mut config = ViewConfig::load(config_path)?;
    overrides.apply(&mut config)?;

    tracing::info!("Understory v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Analysis backend: {}", config.backend_url);

    let bus = Arc::new(EventBus::default());
    let (transport, connection) = backend::connect(&config.backend_url, Arc::clone(&bus)).await?;
    let mut session = ViewSession::start(bus, Arc::new(transport), &config).await?;

    let state = ServerState::new(session.view(), session.visibility_sender());
    let server = UnderstoryServer::new(
        state,
        ServerConfig {
            host: config.host.clone(),
            port: config.port,
        },
    );

    let result = tokio::select! {
        result = server.start() => result,
        _ = connection => Err(anyhow::anyhow!("Analysis backend connection closed")),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    };

    session.shutdown();
    result
}

/// Snapshot files for offline assembly.
#[derive(Debug)]
pub struct AssembleInputs {
    pub digest: PathBuf,
    pub issues: Option<PathBuf>,
    pub edges: Option<PathBuf>,
    pub diagnostics: Option<PathBuf>,
    pub file_index: Option<PathBuf>,
}

pub fn assemble(inputs: &AssembleInputs) -> anyhow::Result<()> {
    let output = assemble_to_json(inputs)?;
    println!("{}", output);
    Ok(())
}

fn assemble_to_json(inputs: &AssembleInputs) -> anyhow::Result<String> {
    let issues: Vec<Issue> = read_optional(inputs.issues.as_deref())?;
    let diagnostics: Diagnostics = read_optional(inputs.diagnostics.as_deref())?;

    if let Some(path) = &inputs.file_index {
        let files: Vec<FileIndexEntry> = read_json(path)?;
        let nodes = understory_core::assemble_file_index(&files, &issues, &diagnostics);
        tracing::info!("Assembled {} file nodes", nodes.len());
        return Ok(serde_json::to_string_pretty(&nodes)?);
    }

    let digest: Digest = read_json(&inputs.digest)?;
    let edges: Vec<GraphEdge> = read_optional(inputs.edges.as_deref())?;
    let model = understory_core::assemble(&digest, &issues, &edges, &diagnostics);
    tracing::info!(
        "Assembled {} nodes, {} links",
        model.nodes.len(),
        model.links.len()
    );
    Ok(serde_json::to_string_pretty(&model)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn read_optional<T: DeserializeOwned + Default>(path: Option<&Path>) -> anyhow::Result<T> {
    match path {
        Some(path) => read_json(path),
        None => Ok(T::default()),
    }
}
