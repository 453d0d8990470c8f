//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::HarvestConfig;
use crate::engine::{HarvestReport, Harvester};
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig};
use crate::state::CheckpointManager;
use crate::store::{DuckDbStore, RecordStore, StoreSummary};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Credential parameter used when the configuration names none
const DEFAULT_CREDENTIAL_PARAM: &str = "client_id";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        let store = Arc::new(DuckDbStore::open(&self.cli.store)?);

        match &self.cli.command {
            Commands::Catalog { reset, reset_all } => {
                self.catalog(config, store, *reset || *reset_all, *reset_all)
                    .await
            }
            Commands::Feed {
                account,
                client_id,
                reset,
            } => {
                self.feed(config, store, account, client_id.as_deref(), *reset)
                    .await
            }
            Commands::Status => self.status(store).await,
        }
    }

    /// Load the configuration file, or defaults when none is given
    fn load_config(&self) -> Result<HarvestConfig> {
        match &self.cli.config {
            Some(path) => {
                let config = HarvestConfig::load(path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(HarvestConfig::default()),
        }
    }

    async fn catalog(
        &self,
        config: HarvestConfig,
        store: Arc<DuckDbStore>,
        reset: bool,
        reset_all: bool,
    ) -> Result<()> {
        let client = HttpClient::with_config(HttpClientConfig::from_settings(
            &config.http,
            &config.api,
        ))?;
        let checkpoints = CheckpointManager::new(store.clone());
        let harvester = Harvester::new(Arc::new(client), store.clone(), checkpoints.clone(), config);

        if reset_all {
            store.delete_all().await?;
            info!("Deleted all stored records");
        }
        if reset {
            checkpoints.reset(&harvester.catalog_target()).await?;
            info!("Checkpoint cleared; starting from the first parent");
        }

        Self::install_ctrl_c(&harvester);
        let report = harvester.run_catalog().await?;
        Self::output_report(&report);
        Ok(())
    }

    async fn feed(
        &self,
        config: HarvestConfig,
        store: Arc<DuckDbStore>,
        account: &str,
        client_id: Option<&str>,
        reset: bool,
    ) -> Result<()> {
        let mut http = HttpClientConfig::from_feed_settings(&config.http, &config.feed);
        match client_id {
            Some(id) => {
                let param = config
                    .api
                    .credential_param
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CREDENTIAL_PARAM.to_string());
                http.credential = Some((param, id.to_string()));
            }
            None => warn!("No client id given; feed requests are sent without a credential"),
        }

        let client = HttpClient::with_config(http)?;
        let checkpoints = CheckpointManager::new(store.clone());
        let harvester = Harvester::new(Arc::new(client), store, checkpoints.clone(), config);

        if reset {
            checkpoints.reset(&Harvester::feed_target(account)).await?;
            info!("Cursor cleared; starting from the first page");
        }

        Self::install_ctrl_c(&harvester);
        let report = harvester.run_feed(account).await?;
        Self::output_report(&report);
        Ok(())
    }

    async fn status(&self, store: Arc<DuckDbStore>) -> Result<()> {
        let checkpoints = CheckpointManager::new(store.clone());
        let checkpoints = checkpoints.all().await?;
        let summary = StoreSummary::collect(store.as_ref()).await?;

        Self::output(&json!({
            "store": store.location(),
            "checkpoints": checkpoints,
            "records": summary,
        }));
        Ok(())
    }

    /// Stop the run between units of work on ctrl-c
    fn install_ctrl_c(harvester: &Harvester) {
        let handle = harvester.cancel_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current unit");
                handle.cancel();
            }
        });
    }

    fn output_report(report: &HarvestReport) {
        Self::output(&serde_json::to_value(report).unwrap_or_default());
    }

    fn output(value: &Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}
