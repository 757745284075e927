//! Application state for the billing API.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::engine::DaycareEngine;

type Clock = dyn Fn() -> NaiveDateTime + Send + Sync;

/// Shared application state.
///
/// Holds the engine and the clock used to stamp requests that carry no
/// explicit time.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<DaycareEngine>,
    clock: Arc<Clock>,
}

impl AppState {
    /// Creates state that stamps requests with the local wall clock.
    pub fn new(engine: Arc<DaycareEngine>) -> Self {
        Self::with_clock(engine, || chrono::Local::now().naive_local())
    }

    /// Creates state with a custom clock.
    pub fn with_clock<C>(engine: Arc<DaycareEngine>, clock: C) -> Self
    where
        C: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        Self {
            engine,
            clock: Arc::new(clock),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &DaycareEngine {
        &self.engine
    }

    /// `at` if given, otherwise the current time.
    pub fn time_or_now(&self, at: Option<NaiveDateTime>) -> NaiveDateTime {
        at.unwrap_or_else(|| (self.clock)())
    }
}
