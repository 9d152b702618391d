use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use riskwatch_common::model::{AlertConfiguration, AlertType};
use riskwatch_common::repository::{ConfigurationRepository, RepoError};

#[derive(Clone, Default)]
pub struct MemoryConfigurationRepository {
    configurations: Arc<DashMap<String, AlertConfiguration>>,
}

impl MemoryConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut items: Vec<AlertConfiguration>) -> Vec<AlertConfiguration> {
    items.sort_by(|a, b| {
        a.created_at_ms
            .cmp(&b.created_at_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
    items
}

#[async_trait]
impl ConfigurationRepository for MemoryConfigurationRepository {
    async fn save(&self, configuration: &AlertConfiguration) -> Result<(), RepoError> {
        self.configurations
            .insert(configuration.id.clone(), configuration.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AlertConfiguration>, RepoError> {
        Ok(self.configurations.get(id).map(|c| c.clone()))
    }

    async fn find_all(&self) -> Result<Vec<AlertConfiguration>, RepoError> {
        Ok(sorted(
            self.configurations.iter().map(|c| c.value().clone()).collect(),
        ))
    }

    async fn find_by_type_and_enabled(
        &self,
        alert_type: AlertType,
    ) -> Result<Vec<AlertConfiguration>, RepoError> {
        Ok(sorted(
            self.configurations
                .iter()
                .filter(|c| c.enabled && c.alert_type == alert_type)
                .map(|c| c.value().clone())
                .collect(),
        ))
    }

    async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        Ok(self.configurations.remove(id).is_some())
    }
}
