//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use dualnode_core::codegen::{ChatCompletionsGenerator, CodeGenerator};
use dualnode_core::relay::{CommandRelay, HttpStationLink, StationLink};
use dualnode_core::{CommandLog, Config, EventBus, StationRegistry, TelemetryStore};

/// Shared application state.
pub type SharedState = Arc<AppState>;

/// All coordinator services, wired together once at startup.
pub struct AppState {
    /// Coordinator configuration.
    pub config: Config,
    /// Station registry.
    pub registry: Arc<StationRegistry>,
    /// Telemetry store.
    pub telemetry: Arc<TelemetryStore>,
    /// Command histories.
    pub commands: Arc<CommandLog>,
    /// Command relay.
    pub relay: Arc<CommandRelay>,
    /// Code-generation collaborator.
    pub generator: Arc<dyn CodeGenerator>,
    /// Real-time event bus.
    pub bus: EventBus,
}

impl AppState {
    /// Build the production state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(config: Config) -> anyhow::Result<SharedState> {
        let link = Arc::new(HttpStationLink::new(&config.commands)?);
        let generator = Arc::new(ChatCompletionsGenerator::new(&config.ai)?);
        Ok(Self::with_collaborators(config, link, generator))
    }

    /// Build state with injected device link and code generator.
    ///
    /// Used by tests to run the full coordinator against scripted
    /// collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: Config,
        link: Arc<dyn StationLink>,
        generator: Arc<dyn CodeGenerator>,
    ) -> SharedState {
        let bus = EventBus::new();
        let registry = Arc::new(StationRegistry::new(&config.registry, bus.clone()));
        let telemetry = Arc::new(TelemetryStore::new(
            &config.telemetry,
            Arc::clone(&registry),
            bus.clone(),
        ));
        let commands = Arc::new(CommandLog::new(&config.commands));
        let relay = Arc::new(CommandRelay::new(
            Arc::clone(&registry),
            Arc::clone(&commands),
            Arc::clone(&telemetry),
            link,
            bus.clone(),
            Duration::from_secs(config.registry.reset_grace_secs),
        ));

        Arc::new(Self {
            config,
            registry,
            telemetry,
            commands,
            relay,
            generator,
            bus,
        })
    }
}
