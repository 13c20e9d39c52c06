//! Blocking resource pool.
//!
//! Idle resources are reused most-recently-returned first and evicted
//! oldest first. All bookkeeping happens under one mutex; user callbacks
//! (factory, destroy, health check) always run with the lock released.

use crate::config::PoolConfig;
use crate::error::{BoxError, PoolError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

type Factory<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;
type Destroy<T> = Box<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;
type HealthCheck<T> = Box<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;
type OnAcquire<T> = Box<dyn Fn(&ResourcePool<T>, &T) -> Result<(), BoxError> + Send + Sync>;

struct IdleResource<T> {
    resource: T,
    returned_at: Instant,
}

struct PoolState<T> {
    /// Front is the most recently returned resource.
    idle: VecDeque<IdleResource<T>>,
    /// Resources created and not yet destroyed, idle ones included.
    active: usize,
    waiting: usize,
    closed: bool,
}

/// Builder for [`ResourcePool`].
pub struct PoolBuilder<T> {
    factory: Factory<T>,
    destroy: Destroy<T>,
    health_check: Option<HealthCheck<T>>,
    on_acquire: Option<OnAcquire<T>>,
    config: PoolConfig,
    idle_timeout: Option<Duration>,
}

impl<T> PoolBuilder<T> {
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.idle_timeout = config.idle_timeout();
        self.config = config;
        self
    }

    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    pub fn max_active(mut self, max_active: usize) -> Self {
        self.config.max_active = max_active;
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.config.wait = wait;
        self
    }

    /// Sets the idle timeout with sub-second precision. `None` disables
    /// eviction.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Validates idle resources before they are handed out. Failing
    /// resources are destroyed and the next idle one is tried.
    pub fn health_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.health_check = Some(Box::new(check));
        self
    }

    /// Runs on every newly created resource before it is handed out.
    pub fn on_acquire<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResourcePool<T>, &T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_acquire = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> ResourcePool<T> {
        ResourcePool {
            factory: self.factory,
            destroy: self.destroy,
            health_check: self.health_check,
            on_acquire: self.on_acquire,
            max_idle: self.config.max_idle,
            max_active: self.config.max_active,
            wait: self.config.wait,
            idle_timeout: self.idle_timeout,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: 0,
                waiting: 0,
                closed: false,
            }),
            cond: OnceLock::new(),
        }
    }
}

/// A thread-safe pool of reusable resources.
pub struct ResourcePool<T> {
    factory: Factory<T>,
    destroy: Destroy<T>,
    health_check: Option<HealthCheck<T>>,
    on_acquire: Option<OnAcquire<T>>,
    max_idle: usize,
    max_active: usize,
    wait: bool,
    idle_timeout: Option<Duration>,
    state: Mutex<PoolState<T>>,
    /// Created on the first blocked acquire.
    cond: OnceLock<Condvar>,
}

impl<T> ResourcePool<T> {
    /// Starts a pool with the default [`PoolConfig`].
    pub fn builder<F, D>(factory: F, destroy: D) -> PoolBuilder<T>
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        D: Fn(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let config = PoolConfig::default();
        PoolBuilder {
            factory: Box::new(factory),
            destroy: Box::new(destroy),
            health_check: None,
            on_acquire: None,
            idle_timeout: config.idle_timeout(),
            config,
        }
    }

    /// Borrows a resource: an idle one if available, else a new one.
    ///
    /// When `max_active` resources are alive this either fails with
    /// [`PoolError::Exhausted`] or blocks until one is released, depending
    /// on the `wait` setting.
    pub fn acquire(&self) -> Result<T, PoolError> {
        let mut state = self.state.lock();
        self.evict_stale(&mut state);

        loop {
            while let Some(entry) = state.idle.pop_front() {
                let resource = entry.resource;
                let Some(check) = &self.health_check else {
                    return Ok(resource);
                };

                let healthy = MutexGuard::unlocked(&mut state, || match check(&resource) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!("Idle resource failed health check: {}", e);
                        false
                    }
                });
                if healthy {
                    return Ok(resource);
                }

                MutexGuard::unlocked(&mut state, || self.destroy_quietly(resource));
                state.active = state.active.saturating_sub(1);
                self.notify_one();
            }

            if state.closed {
                return Err(PoolError::Closed);
            }

            if self.max_active == 0 || state.active < self.max_active {
                state.active += 1;
                drop(state);
                return self.create();
            }

            if !self.wait {
                return Err(PoolError::Exhausted);
            }

            state.waiting += 1;
            self.cond.get_or_init(Condvar::new).wait(&mut state);
            state.waiting -= 1;
        }
    }

    /// Returns a borrowed resource to the pool.
    ///
    /// If the pool is closed the resource is destroyed. If the idle set
    /// grows past `max_idle`, the oldest idle resource is destroyed.
    pub fn release(&self, resource: T) -> Result<(), PoolError> {
        self.put(resource, false)
    }

    /// Destroys a borrowed resource instead of returning it.
    pub fn discard(&self, resource: T) -> Result<(), PoolError> {
        self.put(resource, true)
    }

    /// Closes the pool and destroys all idle resources.
    ///
    /// Blocked acquirers are woken and fail with [`PoolError::Closed`].
    /// Resources still borrowed are destroyed when released.
    pub fn close(&self) -> Result<(), PoolError> {
        let drained: Vec<IdleResource<T>> = {
            let mut state = self.state.lock();
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.active = state.active.saturating_sub(drained.len());
            if let Some(cond) = self.cond.get() {
                cond.notify_all();
            }
            drained
        };

        tracing::debug!("Closing pool, destroying {} idle resources", drained.len());
        let mut first_error = None;
        for entry in drained {
            if let Err(e) = (self.destroy)(entry.resource) {
                first_error.get_or_insert(PoolError::Destroy(e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Resources alive, borrowed or idle.
    pub fn active_count(&self) -> usize {
        self.state.lock().active
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Acquirers currently blocked waiting for capacity.
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn create(&self) -> Result<T, PoolError> {
        let resource = match (self.factory)() {
            Ok(resource) => resource,
            Err(e) => {
                self.forget_one();
                return Err(PoolError::Factory(e));
            }
        };

        if let Some(hook) = &self.on_acquire {
            if let Err(e) = hook(self, &resource) {
                if let Err(destroy_err) = self.put(resource, true) {
                    tracing::warn!("Failed to destroy rejected resource: {}", destroy_err);
                }
                return Err(PoolError::OnAcquire(e));
            }
        }

        Ok(resource)
    }

    fn put(&self, resource: T, force_close: bool) -> Result<(), PoolError> {
        let mut state = self.state.lock();

        let to_destroy = if !state.closed && !force_close {
            state.idle.push_front(IdleResource {
                resource,
                returned_at: Instant::now(),
            });
            if state.idle.len() > self.max_idle {
                state.idle.pop_back().map(|entry| entry.resource)
            } else {
                None
            }
        } else {
            Some(resource)
        };

        let Some(resource) = to_destroy else {
            self.notify_one();
            return Ok(());
        };

        state.active = state.active.saturating_sub(1);
        self.notify_one();
        drop(state);

        (self.destroy)(resource).map_err(PoolError::Destroy)
    }

    /// Destroys idle resources that exceeded the idle timeout, oldest first.
    fn evict_stale(&self, state: &mut MutexGuard<'_, PoolState<T>>) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };

        let now = Instant::now();
        loop {
            match state.idle.back() {
                Some(oldest) if is_stale(oldest.returned_at, now, timeout) => {}
                _ => break,
            }
            let Some(stale) = state.idle.pop_back() else {
                break;
            };
            state.active = state.active.saturating_sub(1);
            self.notify_one();
            MutexGuard::unlocked(state, || self.destroy_quietly(stale.resource));
        }
    }

    fn forget_one(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        self.notify_one();
    }

    fn destroy_quietly(&self, resource: T) {
        if let Err(e) = (self.destroy)(resource) {
            tracing::warn!("Failed to destroy pooled resource: {}", e);
        }
    }

    fn notify_one(&self) {
        if let Some(cond) = self.cond.get() {
            cond.notify_one();
        }
    }
}

impl<T> std::fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResourcePool")
            .field("active", &state.active)
            .field("idle", &state.idle.len())
            .field("waiting", &state.waiting)
            .field("closed", &state.closed)
            .field("max_idle", &self.max_idle)
            .field("max_active", &self.max_active)
            .finish()
    }
}

/// An idle resource expires once its age exceeds the timeout.
fn is_stale(returned_at: Instant, now: Instant, timeout: Duration) -> bool {
    now.saturating_duration_since(returned_at) > timeout
}
