use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hypersight_config::{
    HypersightConfig, config_path, ensure_workspace_config, validate_config,
};
use hypersight_core::Ticket;
use hypersight_infer::{LoadedProvider, ProviderOverrides, load_provider_from_env_or_mock};
use hypersight_store::{LoadedRowStore, RowStore, fetch_ticket_rows, load_row_store};

use crate::cli::Cli;

/// Workspace, effective configuration and the assistant overrides from the
/// command line.
#[derive(Debug, Clone)]
pub struct Session {
    pub workspace: PathBuf,
    pub config: HypersightConfig,
    pub provider_overrides: ProviderOverrides,
}

impl Session {
    pub fn open(cli: &Cli) -> Result<Self> {
        let workspace = cli.workspace.canonicalize().with_context(|| {
            format!(
                "failed to resolve workspace path {}",
                cli.workspace.display()
            )
        })?;

        let mut config = ensure_workspace_config(&workspace).with_context(|| {
            format!(
                "failed to load or create workspace config at {}",
                config_path(&workspace).display()
            )
        })?;
        if let Some(backend) = cli.store_backend {
            config.store.backend = backend;
        }
        for warning in validate_config(&config) {
            eprintln!(
                "HyperSight config warning [{}]: {}",
                warning.code, warning.message
            );
        }

        Ok(Self {
            workspace,
            config,
            provider_overrides: ProviderOverrides {
                provider: cli.assistant_provider,
                model: cli.assistant_model.clone(),
                ..ProviderOverrides::default()
            },
        })
    }

    pub fn from_parts(workspace: impl AsRef<Path>, config: HypersightConfig) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            config,
            provider_overrides: ProviderOverrides::default(),
        }
    }

    pub fn row_store(&self) -> Result<LoadedRowStore> {
        load_row_store(&self.workspace, &self.config.store).with_context(|| {
            format!(
                "failed to open {} ticket store",
                self.config.store.backend.as_str()
            )
        })
    }

    pub fn assistant(&self) -> Result<LoadedProvider> {
        load_provider_from_env_or_mock(&self.config.assistant, self.provider_overrides.clone())
            .context("failed to load assistant provider")
    }
}

/// The dashboard's initial row load.
pub async fn load_ticket_rows(store: &dyn RowStore, row_limit: usize) -> Result<Vec<Ticket>> {
    fetch_ticket_rows(store, row_limit)
        .await
        .context("failed to load ticket analysis data")
}

/// Run one interaction to completion on a current-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use hypersight_config::StoreBackendKind;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn json_backend_rows_load_through_session() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(".hypersight")).expect("create dir");
        fs::write(
            temp.path().join(".hypersight/tickets.json"),
            r#"[{"id":1,"category":"Andra","created_at":"2024-01-01"},
                {"id":2,"category":"Batterier","created_at":"2024-02-01"}]"#,
        )
        .expect("write rows");

        let mut config = HypersightConfig::default();
        config.store.backend = StoreBackendKind::Json;
        let session = Session::from_parts(temp.path(), config);

        let loaded = session.row_store().expect("row store");
        let rows = block_on(load_ticket_rows(loaded.store.as_ref(), 10))
            .expect("runtime")
            .expect("rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id.as_deref(), Some("2"));
    }

    #[test]
    fn missing_store_file_is_reported_with_backend() {
        let temp = tempdir().expect("tempdir");
        let mut config = HypersightConfig::default();
        config.store.backend = StoreBackendKind::Sqlite;
        let session = Session::from_parts(temp.path(), config);

        let err = session.row_store().err().expect("missing sqlite file");
        assert_eq!(err.to_string(), "failed to open sqlite ticket store");
    }
}
