//! Measure and wrap adapters.
//!
//! These retrofit timing onto existing code without changing its results or
//! its failures: values and errors pass through untouched, errors are only
//! copied into the record's `error` field.

use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use crate::category::Category;
use crate::monitor::PerfMonitor;
use crate::record::AdditionalData;

/// Boxed future returned by [`PerfMonitor::wrap_async`].
pub type TimedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

fn async_data() -> AdditionalData {
    let mut data = AdditionalData::new();
    data.insert("async".to_string(), Value::Bool(true));
    data
}

fn outcome_data<T, E: Display>(result: &Result<T, E>, is_async: bool) -> AdditionalData {
    let mut data = if is_async {
        async_data()
    } else {
        AdditionalData::new()
    };
    if let Err(err) = result {
        data.insert("error".to_string(), Value::String(err.to_string()));
    }
    data
}

impl PerfMonitor {
    /// Run `operation` inside a measurement and return its result unchanged.
    pub fn measure<T>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        operation: impl FnOnce() -> T,
    ) -> T {
        let guard = self.scope(name, category);
        let output = operation();
        guard.finish(AdditionalData::new());
        output
    }

    /// Like [`measure`](Self::measure), recording the error text when
    /// `operation` fails. The error itself is returned unchanged.
    pub fn measure_result<T, E: Display>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        operation: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let guard = self.scope(name, category);
        let result = operation();
        guard.finish(outcome_data(&result, false));
        result
    }

    /// Measure a future from now until it settles.
    ///
    /// The record starts when this is called, not when the returned future
    /// is first polled, and ends after `future` completes. Dropping the
    /// returned future ends the record at that point.
    pub fn measure_async<F: Future>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        future: F,
    ) -> impl Future<Output = F::Output> {
        let guard = self.scope(name, category);
        async move {
            let output = future.await;
            guard.finish(async_data());
            output
        }
    }

    /// Measure a fallible future, recording the error text on failure and
    /// returning the original error unchanged.
    pub fn measure_async_result<F, T, E>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        future: F,
    ) -> impl Future<Output = Result<T, E>>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let guard = self.scope(name, category);
        async move {
            let result = future.await;
            guard.finish(outcome_data(&result, true));
            result
        }
    }

    /// Wrap `f` so every call is measured. Arguments and results pass
    /// through unchanged; use a tuple for multiple arguments.
    pub fn wrap<A, R, F>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        f: F,
    ) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        let monitor = self.clone();
        let name = name.into();
        let category = category.into();
        move |arg| monitor.measure(name.clone(), category.clone(), || f(arg))
    }

    /// Like [`wrap`](Self::wrap) for fallible functions: each failed call
    /// records the error text and returns the original error.
    pub fn wrap_result<A, T, E, F>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        f: F,
    ) -> impl Fn(A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        E: Display,
    {
        let monitor = self.clone();
        let name = name.into();
        let category = category.into();
        move |arg| monitor.measure_result(name.clone(), category.clone(), || f(arg))
    }

    /// Wrap an async function so every call is measured until its future
    /// settles.
    pub fn wrap_async<A, Fut, F>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        f: F,
    ) -> impl Fn(A) -> TimedFuture<Fut::Output>
    where
        F: Fn(A) -> Fut,
        Fut: Future + Send + 'static,
    {
        let monitor = self.clone();
        let name = name.into();
        let category = category.into();
        move |arg| {
            let guard = monitor.scope(name.clone(), category.clone());
            let future = f(arg);
            Box::pin(async move {
                let output = future.await;
                guard.finish(async_data());
                output
            })
        }
    }

    /// Like [`wrap_async`](Self::wrap_async) for fallible async functions:
    /// a rejected call records the error text and yields the original error.
    pub fn wrap_async_result<A, T, E, Fut, F>(
        &self,
        name: impl Into<String>,
        category: impl Into<Category>,
        f: F,
    ) -> impl Fn(A) -> TimedFuture<Result<T, E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let monitor = self.clone();
        let name = name.into();
        let category = category.into();
        move |arg| {
            let guard = monitor.scope(name.clone(), category.clone());
            let future = f(arg);
            Box::pin(async move {
                let result = future.await;
                guard.finish(outcome_data(&result, true));
                result
            })
        }
    }
}
