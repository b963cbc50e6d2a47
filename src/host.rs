//! Loads the plugins in a fixed order and hands each one the shared handles.
//!
//! A plugin that fails to build or initialise is logged and left out; the others still load.

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::gateway::HttpGateway;
use crate::supervisor::TaskSupervisor;
use crate::{Command, Data, Error};

/// What every plugin gets while it initialises.
pub struct HostContext<'a> {
    pub gateway: &'a HttpGateway,
    pub supervisor: &'a TaskSupervisor,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Registers routes and scheduled tasks. An error here skips the plugin.
    async fn init(self: Arc<Self>, _host: &HostContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn commands(&self) -> Vec<Command> {
        Vec::new()
    }

    /// Called for every gateway event, in load order.
    async fn on_event(
        &self,
        _ctx: &serenity::Context,
        _event: &serenity::FullEvent,
        _data: &Data,
    ) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedPlugin {
    pub name: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<&'static str>,
    pub skipped: Vec<SkippedPlugin>,
}

pub struct PluginHost<'a> {
    context: HostContext<'a>,
    loaded: Vec<Arc<dyn Plugin>>,
    report: LoadReport,
}

impl<'a> PluginHost<'a> {
    pub fn new(gateway: &'a HttpGateway, supervisor: &'a TaskSupervisor) -> Self {
        Self {
            context: HostContext { gateway, supervisor },
            loaded: Vec::new(),
            report: LoadReport::default(),
        }
    }

    /// Initialises one plugin. Returns it only if it loaded.
    pub async fn load<P: Plugin + 'static>(
        &mut self,
        name: &'static str,
        built: anyhow::Result<P>,
    ) -> Option<Arc<P>> {
        let plugin = match built {
            Ok(plugin) => Arc::new(plugin),
            Err(e) => {
                self.skip(name, e);
                return None;
            }
        };

        let init = plugin.clone().init(&self.context).await;
        if let Err(e) = init {
            self.skip(name, e);
            return None;
        }

        info!("Plugin loaded: {}", name);
        self.report.loaded.push(name);
        self.loaded.push(plugin.clone());
        Some(plugin)
    }

    fn skip(&mut self, name: &'static str, reason: anyhow::Error) {
        error!("Plugin {} skipped: {:#}", name, reason);
        self.report.skipped.push(SkippedPlugin {
            name,
            reason: format!("{:#}", reason),
        });
    }

    pub fn finish(self) -> (Vec<Arc<dyn Plugin>>, LoadReport) {
        info!(
            "Plugins: {} loaded, {} skipped",
            self.report.loaded.len(),
            self.report.skipped.len()
        );
        (self.loaded, self.report)
    }
}
