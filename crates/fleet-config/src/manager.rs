//! Dynamic configuration management with hot-reload capabilities

use crate::config::FleetConfig;
use crate::loader::ConfigLoader;
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ConfigManager {
    current_config: Arc<RwLock<FleetConfig>>,
    config_sender: Arc<watch::Sender<FleetConfig>>,
    config_receiver: watch::Receiver<FleetConfig>,
    loader: Arc<ConfigLoader>,
}

impl ConfigManager {
    pub fn new(loader: ConfigLoader) -> Result<Self> {
        let initial_config = loader
            .load()
            .map_err(|e| anyhow::anyhow!("Failed to load initial configuration: {}", e))?;
        Self::new_with_config_and_loader(initial_config, loader)
    }

    #[cfg(test)]
    pub fn new_with_config(config: FleetConfig) -> Result<Self> {
        Self::new_with_config_and_loader(config, ConfigLoader::new("config", "test"))
    }

    fn new_with_config_and_loader(config: FleetConfig, loader: ConfigLoader) -> Result<Self> {
        let (config_sender, config_receiver) = watch::channel(config.clone());
        Ok(Self {
            current_config: Arc::new(RwLock::new(config)),
            config_sender: Arc::new(config_sender),
            config_receiver,
            loader: Arc::new(loader),
        })
    }

    pub fn get_config(&self) -> FleetConfig {
        self.current_config.read().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FleetConfig> {
        self.config_receiver.clone()
    }

    pub async fn reload_config(&self) -> Result<()> {
        match self.loader.load() {
            Ok(new_config) => {
                if let Err(e) = validator::Validate::validate(&new_config) {
                    error!("Configuration validation failed: {}", e);
                    return Err(anyhow::anyhow!("Invalid configuration: {}", e));
                }

                {
                    let mut config = self.current_config.write();
                    *config = new_config.clone();
                }

                if self.config_sender.send(new_config).is_err() {
                    warn!("Failed to notify configuration subscribers");
                }

                info!("Configuration reloaded successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to reload configuration: {}", e);
                Err(anyhow::anyhow!("Configuration reload failed: {}", e))
            }
        }
    }

    pub async fn start_auto_reload(&self, interval_seconds: u64) {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

            loop {
                interval.tick().await;
                if let Err(e) = manager.reload_config().await {
                    error!("Auto-reload failed: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use proptest::prelude::*;

    fn arb_registry_config() -> impl Strategy<Value = RegistryConfig> {
        (1usize..=100_000, any::<bool>(), 1usize..=1000).prop_map(
            |(max_agents, allow_reregistration, heartbeat_history_capacity)| RegistryConfig {
                max_agents,
                allow_reregistration,
                heartbeat_history_capacity,
            },
        )
    }

    fn arb_fleet_config() -> impl Strategy<Value = FleetConfig> {
        arb_registry_config().prop_map(|registry| FleetConfig {
            registry,
            ..FleetConfig::default()
        })
    }

    proptest! {
        #[test]
        fn test_manager_reflects_initial_config(initial_config in arb_fleet_config()) {
            let result = tokio_test::block_on(async {
                let manager = ConfigManager::new_with_config(initial_config.clone())
                    .map_err(|e| proptest::test_runner::TestCaseError::fail(e.to_string()))?;

                let retrieved = manager.get_config();
                prop_assert_eq!(retrieved.registry.max_agents, initial_config.registry.max_agents);

                let mut _receiver = manager.subscribe();
                let cloned = manager.clone();
                prop_assert_eq!(cloned.get_config().registry.max_agents, manager.get_config().registry.max_agents);

                Ok(())
            });
            result.unwrap();
        }
    }
}
