use async_trait::async_trait;

use super::Deps;
use crate::host::Plugin;
use crate::services::animals::AnimalService;
use crate::Command;

pub struct AnimalsPlugin {
    pub service: AnimalService,
}

impl AnimalsPlugin {
    pub fn build(deps: &Deps<'_>) -> Self {
        Self {
            service: AnimalService::new(deps.http_client.clone()),
        }
    }
}

#[async_trait]
impl Plugin for AnimalsPlugin {
    fn name(&self) -> &'static str {
        "animals"
    }

    fn commands(&self) -> Vec<Command> {
        vec![crate::commands::animals::cat(), crate::commands::animals::dog()]
    }
}
