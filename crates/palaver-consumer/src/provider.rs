//! Contract test orchestration.
//!
//! A [`PluginProvider`] drives one consumer/provider pact through
//! sequential test runs:
//!
//! ```text
//! Unconfigured ─configure─▶ Configured ─execute_test─▶ MockServerStarting
//!      ▲                        ▲                            │
//!      │                        │                            ▼
//!      │                        │                      MockServerReady
//!      │                        │                            │
//!      │                        │                            ▼
//!      │                        │                     InteractionsLoaded
//!      │                        │                            │
//!      │                        │                            ▼
//!      │                        │                        Executing
//!      │                        │                            │
//!      │                        │                            ▼
//!      │                        │                        Verifying
//!      │                        │                            │
//!      │                        └──── reset ◀──── Passed | Failed
//! ```
//!
//! Every run holds two scoped resources: the pending interaction buffer and
//! the mock server. Both are released when the run ends, whichever step
//! ended it, mock server first.

use std::future::Future;

use palaver_proto::Interaction;

use crate::{
    config::{PluginProviderConfig, ResolvedConfig},
    engine::{EngineError, MockEngine},
    error::{BoxError, ConsumerError},
    mock_server::MockServerConfig,
    pact::merge_interactions,
    readiness::wait_for_port,
};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
    /// No configuration yet
    Unconfigured,
    /// Ready to run a test
    Configured,
    /// Mock server start requested
    MockServerStarting,
    /// Mock server accepts connections
    MockServerReady,
    /// Interactions registered with the mock server
    InteractionsLoaded,
    /// Consumer test callback running
    Executing,
    /// Asking the engine for mismatches
    Verifying,
    /// Run verified and pact written
    Passed,
    /// Run failed at some step
    Failed,
}

/// Result of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Verified and persisted
    Passed,
    /// Failed at some step
    Failed,
}

/// Consumer contract test driver.
///
/// Reusable across sequential tests; each [`execute_test`](Self::execute_test)
/// starts from an empty interaction set.
#[derive(Debug)]
pub struct PluginProvider<M: MockEngine> {
    engine: M,
    config: Option<ResolvedConfig>,
    state: ProviderState,
    interactions: Vec<Interaction>,
    verified: Vec<Interaction>,
    last_outcome: Option<Outcome>,
}

impl<M: MockEngine> PluginProvider<M> {
    /// Provider that must be configured before use.
    pub fn new(engine: M) -> Self {
        Self {
            engine,
            config: None,
            state: ProviderState::Unconfigured,
            interactions: Vec::new(),
            verified: Vec::new(),
            last_outcome: None,
        }
    }

    /// Provider configured with `config`.
    pub fn with_config(engine: M, config: &PluginProviderConfig) -> Result<Self, ConsumerError> {
        let mut provider = Self::new(engine);
        provider.configure(config)?;
        Ok(provider)
    }

    /// Fill defaults, validate and store `config`.
    ///
    /// Safe to call before every test. Without an explicit port, the admin
    /// port chosen by an earlier call is kept.
    pub fn configure(&mut self, config: &PluginProviderConfig) -> Result<(), ConsumerError> {
        let mut config = config.clone();
        if config.port.is_none_or(|port| port == 0) {
            config.port = self.config.as_ref().map(|resolved| resolved.admin_port);
        }

        let resolved = config.resolve()?;
        tracing::debug!(
            consumer = %resolved.consumer,
            provider = %resolved.provider,
            admin_port = resolved.admin_port,
            pact_dir = %resolved.pact_dir.display(),
            "provider configured"
        );

        self.config = Some(resolved);
        transition(&mut self.state, ProviderState::Configured);
        Ok(())
    }

    /// Queue an interaction for the next test run.
    pub fn add_interaction(&mut self, interaction: Interaction) -> Result<&mut Self, ConsumerError> {
        interaction.validate()?;
        self.interactions.push(interaction);
        Ok(self)
    }

    /// Run one consumer test against a fresh mock server.
    ///
    /// Starts the mock server, waits for it, loads the pending interactions,
    /// runs `test`, verifies, and on success merges the interactions into
    /// the pact file. The mock server is released and the pending
    /// interactions cleared on every path out.
    pub async fn execute_test<F, Fut>(&mut self, test: F) -> Result<(), ConsumerError>
    where
        F: FnOnce(MockServerConfig) -> Fut,
        Fut: Future<Output = Result<(), BoxError>>,
    {
        let Self { engine, config, state, interactions, verified, last_outcome } = self;

        // Cleared on every path out, after the mock server is released.
        let pending = PendingInteractions { interactions };
        let config = config
            .as_ref()
            .ok_or_else(|| ConsumerError::config("provider has not been configured"))?;
        let engine = &*engine;
        let mut mock_server = MockServerGuard::new(engine, config.admin_port);

        let result = run(engine, config, state, &mut mock_server, &pending, verified, test).await;

        let started = mock_server.started;
        let released = mock_server.release();
        let result = match result {
            Ok(()) if started && !released => {
                Err(ConsumerError::MockServerLifecycle(EngineError::ServerNotFound {
                    port: config.admin_port,
                }))
            },
            result => result,
        };

        let outcome = match &result {
            Ok(()) => Outcome::Passed,
            Err(e) => {
                tracing::debug!(admin_port = config.admin_port, "test run failed: {}", e);
                Outcome::Failed
            },
        };
        transition(
            state,
            match outcome {
                Outcome::Passed => ProviderState::Passed,
                Outcome::Failed => ProviderState::Failed,
            },
        );

        drop(pending);

        *last_outcome = Some(outcome);
        transition(state, ProviderState::Configured);
        result
    }

    /// Merge every interaction verified so far into the pact file.
    ///
    /// Idempotent.
    pub async fn write_pact(&self) -> Result<(), ConsumerError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ConsumerError::config("provider has not been configured"))?;
        write_pact(&self.engine, config, &self.verified).await
    }

    /// Current state.
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Outcome of the last completed run.
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Interactions queued for the next run.
    pub fn pending_interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Interactions verified across all passing runs.
    pub fn verified_interactions(&self) -> &[Interaction] {
        &self.verified
    }

    /// Resolved configuration, if configured.
    pub fn config(&self) -> Option<&ResolvedConfig> {
        self.config.as_ref()
    }

    /// Underlying engine.
    pub fn engine(&self) -> &M {
        &self.engine
    }
}

async fn run<M, F, Fut>(
    engine: &M,
    config: &ResolvedConfig,
    state: &mut ProviderState,
    mock_server: &mut MockServerGuard<'_, M>,
    pending: &[Interaction],
    verified: &mut Vec<Interaction>,
    test: F,
) -> Result<(), ConsumerError>
where
    M: MockEngine,
    F: FnOnce(MockServerConfig) -> Fut,
    Fut: Future<Output = Result<(), BoxError>>,
{
    transition(state, ProviderState::MockServerStarting);
    let port = engine
        .start_mock_server(&config.mock_server_request())
        .await
        .map_err(ConsumerError::MockServerLifecycle)?;
    mock_server.started = true;

    wait_for_port(&config.host, config.admin_port, config.readiness_timeout).await?;
    transition(state, ProviderState::MockServerReady);

    tracing::info!(admin_port = config.admin_port, count = pending.len(), "loading interactions");
    engine
        .add_interactions(config.admin_port, pending)
        .await
        .map_err(ConsumerError::InteractionLoad)?;
    transition(state, ProviderState::InteractionsLoaded);

    transition(state, ProviderState::Executing);
    let endpoint = MockServerConfig {
        host: config.host.clone(),
        port,
        tls_certificate: engine.tls_certificate_authority(),
    };
    test(endpoint).await.map_err(ConsumerError::Callback)?;

    transition(state, ProviderState::Verifying);
    let verification =
        engine.verify(config.admin_port).await.map_err(ConsumerError::MockServerLifecycle)?;
    if !verification.is_success() {
        tracing::info!(
            admin_port = config.admin_port,
            mismatches = ?verification.mismatches,
            "contract verification failed"
        );
        return Err(ConsumerError::ContractVerificationFailed {
            mismatches: verification.mismatches,
        });
    }

    merge_interactions(verified, pending);
    write_pact(engine, config, verified).await
}

async fn write_pact<M: MockEngine>(
    engine: &M,
    config: &ResolvedConfig,
    interactions: &[Interaction],
) -> Result<(), ConsumerError> {
    let target = config.pact_target();
    engine.write_pact_file(&target, interactions).await.map_err(|e| {
        tracing::warn!(path = %target.file_path().display(), "pact write failed: {}", e);
        ConsumerError::ArtifactWrite(e)
    })
}

fn transition(state: &mut ProviderState, next: ProviderState) {
    tracing::debug!(from = ?*state, to = ?next, "provider state");
    *state = next;
}

/// Pending interactions for one run; cleared on drop.
struct PendingInteractions<'a> {
    interactions: &'a mut Vec<Interaction>,
}

impl std::ops::Deref for PendingInteractions<'_> {
    type Target = [Interaction];

    fn deref(&self) -> &[Interaction] {
        self.interactions
    }
}

impl Drop for PendingInteractions<'_> {
    fn drop(&mut self) {
        tracing::trace!(count = self.interactions.len(), "clearing pending interactions");
        self.interactions.clear();
    }
}

/// Mock server for one run.
///
/// [`release`](Self::release) reports whether the engine still had the
/// server; dropping without releasing (a cancelled run) cleans up silently.
struct MockServerGuard<'a, M: MockEngine> {
    engine: &'a M,
    admin_port: u16,
    started: bool,
    released: bool,
}

impl<'a, M: MockEngine> MockServerGuard<'a, M> {
    fn new(engine: &'a M, admin_port: u16) -> Self {
        Self { engine, admin_port, started: false, released: false }
    }

    fn release(mut self) -> bool {
        self.released = true;
        self.cleanup()
    }

    fn cleanup(&self) -> bool {
        let released = self.engine.cleanup_mock_server(self.admin_port);
        if released {
            tracing::debug!(admin_port = self.admin_port, "mock server cleaned up");
        } else if self.started {
            tracing::warn!(admin_port = self.admin_port, "mock server was already gone at cleanup");
        }
        released
    }
}

impl<M: MockEngine> Drop for MockServerGuard<'_, M> {
    fn drop(&mut self) {
        if !self.released {
            self.cleanup();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::PluginEngine;

    #[test]
    fn starts_unconfigured() {
        let provider = PluginProvider::new(PluginEngine::new());

        assert_eq!(provider.state(), ProviderState::Unconfigured);
        assert!(provider.config().is_none());
        assert!(provider.last_outcome().is_none());
    }

    #[tokio::test]
    async fn execute_without_config_is_invalid_configuration() {
        let mut provider = PluginProvider::new(PluginEngine::new());
        provider.add_interaction(Interaction::new("PING", "PONG")).unwrap();

        let err = provider.execute_test(|_| async { Ok::<_, BoxError>(()) }).await.unwrap_err();

        assert!(matches!(err, ConsumerError::InvalidConfiguration { .. }));
        assert_eq!(provider.state(), ProviderState::Unconfigured);
        assert!(provider.pending_interactions().is_empty());
    }

    #[test]
    fn invalid_interaction_is_rejected_and_not_queued() {
        let mut provider = PluginProvider::new(PluginEngine::new());

        let err = provider.add_interaction(Interaction::new(" PING", "PONG")).unwrap_err();

        assert!(matches!(err, ConsumerError::InvalidInteraction(_)));
        assert!(provider.pending_interactions().is_empty());
    }

    #[test]
    fn add_interaction_chains() {
        let mut provider = PluginProvider::new(PluginEngine::new());

        provider
            .add_interaction(Interaction::new("PING", "PONG"))
            .unwrap()
            .add_interaction(Interaction::new("STATUS", "UP"))
            .unwrap();

        assert_eq!(provider.pending_interactions().len(), 2);
    }

    #[test]
    fn reconfigure_keeps_chosen_port() {
        let dir = tempfile::tempdir().unwrap();
        let config = PluginProviderConfig {
            log_dir: Some(dir.path().join("logs")),
            pact_dir: Some(dir.path().join("pacts")),
            ..PluginProviderConfig::new("billing", "ledger")
        };

        let mut provider = PluginProvider::with_config(PluginEngine::new(), &config).unwrap();
        let first = provider.config().unwrap().admin_port;
        provider.configure(&config).unwrap();

        assert_eq!(provider.config().unwrap().admin_port, first);
        assert_eq!(provider.state(), ProviderState::Configured);
    }
}
