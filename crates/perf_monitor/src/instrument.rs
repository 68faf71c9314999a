//! Timing decorator for lifecycle hook sets.
//!
//! [`instrument_methods`] wraps any [`LifecycleHooks`] implementation in an
//! [`Instrumented`] value that implements the same trait. Each selected hook
//! is timed under `"<component>.<hook>"`; hooks whose name contains
//! `render` are classified as [`Category::RENDER`], all others as
//! [`Category::LIFECYCLE`]. The wrapped value is not modified.

use std::collections::BTreeSet;

use crate::category::Category;
use crate::monitor::PerfMonitor;

/// Names of the hooks on [`LifecycleHooks`], in call order.
pub const LIFECYCLE_METHODS: [&str; 5] = ["mount", "should_update", "update", "render", "unmount"];

/// Lifecycle hooks of a UI-style unit.
pub trait LifecycleHooks {
    /// Input the unit is rendered from
    type Props;
    /// Rendered output
    type Output;

    /// Called once when the unit is attached.
    fn mount(&mut self) {}

    /// Decide whether new props require an update.
    fn should_update(&self, _props: &Self::Props) -> bool {
        true
    }

    /// Apply new props.
    fn update(&mut self, _props: &Self::Props) {}

    /// Produce output from the current state.
    fn render(&self) -> Self::Output;

    /// Called once when the unit is detached.
    fn unmount(&mut self) {}
}

/// Category for a hook name.
pub fn method_category(method: &str) -> Category {
    if method.to_ascii_lowercase().contains("render") {
        Category::RENDER
    } else {
        Category::LIFECYCLE
    }
}

#[derive(Debug, Clone)]
struct Probe {
    monitor: PerfMonitor,
    component: String,
    methods: BTreeSet<&'static str>,
}

impl Probe {
    fn time<R>(&self, method: &'static str, call: impl FnOnce() -> R) -> R {
        if !self.methods.contains(method) {
            return call();
        }
        self.monitor.measure(
            format!("{}.{}", self.component, method),
            method_category(method),
            call,
        )
    }
}

/// A [`LifecycleHooks`] implementation with selected hooks timed.
#[derive(Debug, Clone)]
pub struct Instrumented<H> {
    inner: H,
    probe: Probe,
}

impl<H> Instrumented<H> {
    /// The wrapped hooks.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Unwrap, discarding instrumentation.
    pub fn into_inner(self) -> H {
        self.inner
    }

    /// Component name used as the record name prefix.
    pub fn component(&self) -> &str {
        &self.probe.component
    }

    /// Check whether a hook is timed.
    pub fn is_instrumented(&self, method: &str) -> bool {
        self.probe.methods.contains(method)
    }
}

/// Wrap `hooks` so each hook named in `methods` is timed.
///
/// Names that are not hooks of [`LifecycleHooks`] are ignored.
pub fn instrument_methods<H: LifecycleHooks>(
    monitor: &PerfMonitor,
    hooks: H,
    methods: &[&str],
    component: impl Into<String>,
) -> Instrumented<H> {
    let component = component.into();
    let mut selected = BTreeSet::new();
    for method in methods {
        match LIFECYCLE_METHODS.iter().find(|known| *known == method) {
            Some(known) => {
                selected.insert(*known);
            }
            None => {
                tracing::debug!(target: "perf", component = %component, method, "ignoring unknown lifecycle hook");
            }
        }
    }

    Instrumented {
        inner: hooks,
        probe: Probe {
            monitor: monitor.clone(),
            component,
            methods: selected,
        },
    }
}

impl<H: LifecycleHooks> LifecycleHooks for Instrumented<H> {
    type Props = H::Props;
    type Output = H::Output;

    fn mount(&mut self) {
        self.probe.time("mount", || self.inner.mount())
    }

    fn should_update(&self, props: &Self::Props) -> bool {
        self.probe.time("should_update", || self.inner.should_update(props))
    }

    fn update(&mut self, props: &Self::Props) {
        self.probe.time("update", || self.inner.update(props))
    }

    fn render(&self) -> Self::Output {
        self.probe.time("render", || self.inner.render())
    }

    fn unmount(&mut self) {
        self.probe.time("unmount", || self.inner.unmount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MonitorConfig;

    struct Counter {
        clock: ManualClock,
        value: u32,
        mounted: bool,
    }

    impl LifecycleHooks for Counter {
        type Props = u32;
        type Output = String;

        fn mount(&mut self) {
            self.mounted = true;
        }

        fn should_update(&self, props: &u32) -> bool {
            *props != self.value
        }

        fn update(&mut self, props: &u32) {
            self.clock.advance_ms(5);
            self.value = *props;
        }

        fn render(&self) -> String {
            self.clock.advance_ms(20);
            format!("count: {}", self.value)
        }
    }

    fn setup(methods: &[&str]) -> (PerfMonitor, Instrumented<Counter>) {
        let clock = ManualClock::new();
        let monitor = PerfMonitor::with_clock(MonitorConfig::default(), clock.clone());
        let counter = Counter {
            clock,
            value: 0,
            mounted: false,
        };
        let hooks = instrument_methods(&monitor, counter, methods, "Counter");
        (monitor, hooks)
    }

    #[test]
    fn test_method_category() {
        assert_eq!(method_category("render"), Category::RENDER);
        assert_eq!(method_category("prerenderCheck"), Category::RENDER);
        assert_eq!(method_category("mount"), Category::LIFECYCLE);
    }

    #[test]
    fn test_calls_forward_arguments_and_results() {
        let (_monitor, mut hooks) = setup(&LIFECYCLE_METHODS);

        hooks.mount();
        assert!(hooks.should_update(&3));
        hooks.update(&3);
        assert_eq!(hooks.render(), "count: 3");
        assert!(!hooks.should_update(&3));
        assert!(hooks.inner().mounted);
    }

    #[test]
    fn test_selected_hooks_are_recorded_by_category() {
        let (monitor, mut hooks) = setup(&["update", "render"]);

        hooks.mount();
        hooks.update(&1);
        hooks.render();

        let stats = monitor.stats();
        let render = stats.category(&Category::RENDER).unwrap();
        assert_eq!(render.count, 1);
        assert_eq!(render.max_duration, 20.0);
        assert_eq!(render.slow_count, 1);

        let lifecycle = stats.category(&Category::LIFECYCLE).unwrap();
        assert_eq!(lifecycle.count, 1);
        assert_eq!(lifecycle.avg_duration, 5.0);

        let slow = monitor.slow_operations(1);
        assert_eq!(slow[0].name, "Counter.render");
    }

    #[test]
    fn test_unknown_methods_are_ignored() {
        let (monitor, hooks) = setup(&["componentDidWhatever", "render"]);

        assert!(hooks.is_instrumented("render"));
        assert!(!hooks.is_instrumented("componentDidWhatever"));
        assert_eq!(hooks.component(), "Counter");

        hooks.render();
        assert_eq!(monitor.record_count(), 1);
    }

    #[test]
    fn test_into_inner_keeps_state() {
        let (_monitor, mut hooks) = setup(&["update"]);
        hooks.update(&9);
        assert_eq!(hooks.into_inner().value, 9);
    }
}
