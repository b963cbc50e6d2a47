use async_trait::async_trait;
use std::time::Duration;

use super::Deps;
use crate::db::Database;
use crate::host::Plugin;
use crate::services::economy::EconomyService;
use crate::Command;

pub struct EconomyPlugin {
    pub service: EconomyService,
}

impl EconomyPlugin {
    pub fn build(deps: &Deps<'_>) -> anyhow::Result<Self> {
        let config = deps.config;
        let db = Database::new(config)?;
        db.execute_init()?;
        Ok(Self {
            service: EconomyService::new(db, Duration::from_secs(config.work_cooldown_secs)),
        })
    }
}

#[async_trait]
impl Plugin for EconomyPlugin {
    fn name(&self) -> &'static str {
        "economy"
    }

    fn commands(&self) -> Vec<Command> {
        use crate::commands::economy;
        vec![economy::balance(), economy::work(), economy::gamble()]
    }
}
