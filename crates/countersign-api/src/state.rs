//! Application state wiring the workflows together.
//!
//! Workflows are generic over repository/collaborator traits; AppState pins
//! them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use countersign_core::proposal::ProposalWorkflow;
use countersign_core::signing::SigningWorkflow;
use countersign_core::token::DecisionTokenSigner;
use countersign_infra::blob::LocalBlobStore;
use countersign_infra::config::{self, AppConfig};
use countersign_infra::notify::WebhookNotifier;
use countersign_infra::sqlite::directory::SqliteEmployeeDirectory;
use countersign_infra::sqlite::order::SqliteOrderRepository;
use countersign_infra::sqlite::pool::DatabasePool;
use countersign_infra::sqlite::proposal::SqliteProposalRepository;
use countersign_infra::sqlite::session::SqliteIdentityProvider;

/// Concrete type aliases for the workflow generics pinned to infra
/// implementations.
pub type ConcreteSigningWorkflow = SigningWorkflow<
    SqliteOrderRepository,
    LocalBlobStore,
    WebhookNotifier,
    SqliteEmployeeDirectory,
>;

pub type ConcreteProposalWorkflow = ProposalWorkflow<
    SqliteOrderRepository,
    SqliteProposalRepository,
    WebhookNotifier,
    SqliteEmployeeDirectory,
>;

/// Shared application state holding the workflows and read-side repositories.
#[derive(Clone)]
pub struct AppState {
    pub signing: Arc<ConcreteSigningWorkflow>,
    pub proposals: Arc<ConcreteProposalWorkflow>,
    pub orders: Arc<SqliteOrderRepository>,
    pub identity: Arc<SqliteIdentityProvider>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, load
    /// config, wire the workflows.
    pub async fn init(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = config::load_config(&data_dir).await;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("countersign.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let blob_store = LocalBlobStore::new(config.blob_dir(&data_dir));
        let notifier_timeout = Duration::from_secs(config.notifier.timeout_secs);
        let tokens = DecisionTokenSigner::new(config.decision_token.secret.as_bytes().to_vec());
        let token_ttl = chrono::Duration::hours(config.decision_token.ttl_hours);

        let signing = SigningWorkflow::new(
            SqliteOrderRepository::new(db_pool.clone()),
            blob_store,
            WebhookNotifier::new(config.notifier.endpoint.clone(), notifier_timeout)?,
            SqliteEmployeeDirectory::new(db_pool.clone()),
        );

        let proposals = ProposalWorkflow::new(
            SqliteOrderRepository::new(db_pool.clone()),
            SqliteProposalRepository::new(db_pool.clone()),
            WebhookNotifier::new(config.notifier.endpoint.clone(), notifier_timeout)?,
            SqliteEmployeeDirectory::new(db_pool.clone()),
            tokens,
            config.public_base_url.clone(),
            token_ttl,
        );

        Ok(Self {
            signing: Arc::new(signing),
            proposals: Arc::new(proposals),
            orders: Arc::new(SqliteOrderRepository::new(db_pool.clone())),
            identity: Arc::new(SqliteIdentityProvider::new(db_pool.clone())),
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }
}
