//! Ordered execution of the registered lifecycle hooks.

use super::{
    LifecycleError, OnApplicationBootstrap, OnApplicationShutdown, OnModuleDestroy, OnModuleInit,
    Phase, Result,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

type HookCall<T> = for<'h> fn(&'h T) -> BoxFuture<'h, Result<()>>;

/// Providers registered for one phase, with the trait method to call on them.
struct Hooks<T: ?Sized> {
    phase: Phase,
    call: HookCall<T>,
    providers: Vec<(String, Arc<T>)>,
}

impl<T: ?Sized + Send + Sync> Hooks<T> {
    fn new(phase: Phase, call: HookCall<T>) -> Self {
        Self {
            phase,
            call,
            providers: Vec::new(),
        }
    }

    fn push(&mut self, name: String, provider: Arc<T>) {
        self.providers.push((name, provider));
    }

    /// Returns the number of failed hooks. A fatal phase stops at its first
    /// failure and returns it instead.
    async fn run(&self) -> Result<usize> {
        let mut ordered: Vec<_> = self.providers.iter().collect();
        if self.phase == Phase::OnModuleDestroy {
            ordered.reverse();
        }

        let mut failures = 0;
        for (name, provider) in ordered {
            tracing::debug!(phase = %self.phase, provider = %name, "Running hook");
            let Err(e) = (self.call)(&**provider).await else {
                continue;
            };
            let err = LifecycleError::HookFailed {
                phase: self.phase,
                provider: name.clone(),
                reason: e.to_string(),
            };
            if self.phase.is_fatal() {
                tracing::error!(error = %err, "Lifecycle hook failed");
                return Err(err);
            }
            tracing::warn!(error = %err, "Lifecycle hook failed, continuing");
            failures += 1;
        }

        tracing::info!(
            phase = %self.phase,
            hooks = self.providers.len(),
            failures,
            "Lifecycle phase complete"
        );
        Ok(failures)
    }

    async fn run_within(&self, limit: Option<Duration>) -> Result<usize> {
        let Some(limit) = limit else {
            return self.run().await;
        };
        tokio::time::timeout(limit, self.run())
            .await
            .map_err(|_| LifecycleError::Timeout {
                phase: self.phase,
                limit,
            })?
    }
}

fn module_init<'a>(provider: &'a (dyn OnModuleInit + 'static)) -> BoxFuture<'a, Result<()>> {
    provider.on_module_init()
}

fn application_bootstrap<'a>(
    provider: &'a (dyn OnApplicationBootstrap + 'static),
) -> BoxFuture<'a, Result<()>> {
    provider.on_application_bootstrap()
}

fn application_shutdown<'a>(
    provider: &'a (dyn OnApplicationShutdown + 'static),
) -> BoxFuture<'a, Result<()>> {
    provider.on_application_shutdown()
}

fn module_destroy<'a>(provider: &'a (dyn OnModuleDestroy + 'static)) -> BoxFuture<'a, Result<()>> {
    provider.on_module_destroy()
}

/// Hook providers of an application, grouped by phase
///
/// `start` runs init then bootstrap hooks in registration order and fails on
/// the first error. `stop` runs shutdown hooks in registration order, then
/// destroy hooks in reverse, and only counts failures.
pub struct LifecycleManager {
    init: Hooks<dyn OnModuleInit>,
    bootstrap: Hooks<dyn OnApplicationBootstrap>,
    shutdown: Hooks<dyn OnApplicationShutdown>,
    destroy: Hooks<dyn OnModuleDestroy>,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self {
            init: Hooks::new(Phase::OnModuleInit, module_init),
            bootstrap: Hooks::new(Phase::OnApplicationBootstrap, application_bootstrap),
            shutdown: Hooks::new(Phase::OnApplicationShutdown, application_shutdown),
            destroy: Hooks::new(Phase::OnModuleDestroy, module_destroy),
        }
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init<T: OnModuleInit + 'static>(&mut self, provider: Arc<T>, name: impl Into<String>) {
        self.init.push(name.into(), provider);
    }

    pub fn on_bootstrap<T: OnApplicationBootstrap + 'static>(
        &mut self,
        provider: Arc<T>,
        name: impl Into<String>,
    ) {
        self.bootstrap.push(name.into(), provider);
    }

    pub fn on_shutdown<T: OnApplicationShutdown + 'static>(
        &mut self,
        provider: Arc<T>,
        name: impl Into<String>,
    ) {
        self.shutdown.push(name.into(), provider);
    }

    pub fn on_destroy<T: OnModuleDestroy + 'static>(
        &mut self,
        provider: Arc<T>,
        name: impl Into<String>,
    ) {
        self.destroy.push(name.into(), provider);
    }

    /// Each phase is bounded by its own limit, when one is given.
    pub async fn start(
        &self,
        init_limit: Option<Duration>,
        bootstrap_limit: Option<Duration>,
    ) -> Result<()> {
        self.init.run_within(init_limit).await?;
        self.bootstrap.run_within(bootstrap_limit).await?;
        Ok(())
    }

    /// Returns how many shutdown and destroy hooks failed.
    pub async fn stop(&self) -> usize {
        // neither phase is fatal, so both always yield a count
        let shutdown = self.shutdown.run().await.unwrap_or(1);
        let destroy = self.destroy.run().await.unwrap_or(1);
        shutdown + destroy
    }

    pub fn hook_count(&self, phase: Phase) -> usize {
        match phase {
            Phase::OnModuleInit => self.init.providers.len(),
            Phase::OnApplicationBootstrap => self.bootstrap.providers.len(),
            Phase::OnApplicationShutdown => self.shutdown.providers.len(),
            Phase::OnModuleDestroy => self.destroy.providers.len(),
        }
    }
}
