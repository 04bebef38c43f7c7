use std::sync::Arc;

use anyhow::Context;

use learnhub_infra::{
    AppConfig, InMemoryLearningStore, LearningStore, LearningWorkflows, ModuleMirrorSync, PostgresLearningStore,
};

/// Everything handlers need, shared behind an `Arc` in the request extensions.
#[derive(Debug, Clone)]
pub struct AppServices {
    workflows: LearningWorkflows,
}

impl AppServices {
    pub fn new(workflows: LearningWorkflows) -> Self {
        Self { workflows }
    }

    pub fn workflows(&self) -> &LearningWorkflows {
        &self.workflows
    }

    pub fn store(&self) -> &dyn LearningStore {
        self.workflows.store()
    }
}

/// Postgres when `DATABASE_URL` is set, the in-memory store otherwise.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn LearningStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresLearningStore::connect(url)
                .await
                .context("failed to initialise Postgres store")?;
            tracing::info!("using Postgres learning store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory learning store");
            Arc::new(InMemoryLearningStore::new())
        }
    };

    let workflows = LearningWorkflows::new(store, Arc::new(ModuleMirrorSync), config.reorder_policy);
    Ok(AppServices::new(workflows))
}
