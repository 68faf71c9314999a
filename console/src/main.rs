//! Perf Console - drives a synthetic workload through the performance
//! monitor and polls its statistics, the way a debugging dashboard would.
//!
//! Usage: `perf-console [settings-dir] [--enable | --disable | --detailed]`.
//!
//! Settings are read from `perf_monitor.json` in the settings directory
//! (default: the system temp dir). The file is only written when a toggle
//! flag is given, so `PERF_MONITOR` keeps working until the user stores an
//! explicit choice.

use std::path::PathBuf;
use std::time::Duration;

use perf_monitor::{
    global, install_global, measure_scope, persist_settings, resolve_settings, AdditionalData, Category,
    ChannelLongTaskSource, JsonFileSettings, LongTaskEvent, MonitorConfig, MonitorSettings, PerfMonitor,
    SettingsStore, ENV_VAR,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_ROUNDS: usize = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting perf console");

    let args = ConsoleArgs::parse(std::env::args().skip(1))?;
    let settings_dir = args.settings_dir.unwrap_or_else(std::env::temp_dir);
    let settings_store = JsonFileSettings::in_dir(&settings_dir);
    tracing::info!("Settings file: {:?}", settings_store.path());

    let env_value = std::env::var(ENV_VAR).ok();
    let settings = startup_settings(&settings_store, env_value.as_deref(), args.toggle);
    let monitor = PerfMonitor::new(MonitorConfig::default());
    monitor.apply_settings(&settings);
    install_global(monitor.clone());

    let long_tasks = ChannelLongTaskSource::new();
    let tasks = monitor.run(&long_tasks);

    if !monitor.is_enabled() {
        tracing::info!("Monitoring disabled; set PERF_MONITOR=1 to enable");
    }

    for round in 0..POLL_ROUNDS {
        run_workload(&monitor, &long_tasks, round).await;
        tokio::time::sleep(POLL_INTERVAL).await;

        if let Some(monitor) = global() {
            println!("{}", serde_json::to_string_pretty(&monitor.stats())?);
        }
    }

    if let Some(monitor) = global() {
        println!("{}", serde_json::to_string_pretty(&monitor.debug_snapshot())?);
    }

    tasks.shutdown().await;
    tracing::info!("Perf console finished");
    Ok(())
}

/// Flags for this run. Only an explicit toggle is stored; the resolved
/// startup value never is.
fn startup_settings(
    store: &dyn SettingsStore,
    env_value: Option<&str>,
    toggle: Option<MonitorSettings>,
) -> MonitorSettings {
    match toggle {
        Some(toggle) => {
            persist_settings(store, &toggle);
            toggle
        }
        None => resolve_settings(store, env_value),
    }
}

/// Parsed command line.
#[derive(Debug, Default)]
struct ConsoleArgs {
    settings_dir: Option<PathBuf>,
    toggle: Option<MonitorSettings>,
}

impl ConsoleArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        for arg in args {
            let toggle = match arg.as_str() {
                "--enable" => MonitorSettings {
                    enabled: true,
                    detailed_tracing: false,
                },
                "--disable" => MonitorSettings {
                    enabled: false,
                    detailed_tracing: false,
                },
                "--detailed" => MonitorSettings {
                    enabled: true,
                    detailed_tracing: true,
                },
                flag if flag.starts_with("--") => anyhow::bail!("unknown flag: {flag}"),
                _ => {
                    parsed.settings_dir = Some(PathBuf::from(&arg));
                    continue;
                }
            };
            parsed.toggle = Some(toggle);
        }
        Ok(parsed)
    }
}

/// One round of simulated rendering, requests, computation and a blocking
/// task.
async fn run_workload(monitor: &PerfMonitor, long_tasks: &ChannelLongTaskSource, round: usize) {
    // frames block their thread, so keep them off the async workers
    tokio::task::block_in_place(|| {
        for frame in 0..5u64 {
            measure_scope!(monitor, format!("frame-{frame}"), Category::RENDER);
            std::thread::sleep(Duration::from_millis(4 + frame * 3));
        }
    });

    let fetch = monitor.wrap_async("fetch_document", Category::API, |delay_ms: u64| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        delay_ms
    });
    fetch(120 + round as u64 * 50).await;

    let checksum = monitor.measure("checksum", Category::COMPUTATION, || {
        (0..200_000u64).fold(0u64, |acc, n| acc.wrapping_mul(31).wrapping_add(n))
    });
    tracing::debug!(checksum, "computed checksum");

    let token = monitor.start("open_dialog", Category::TRANSITION);
    tokio::time::sleep(Duration::from_millis(80)).await;
    let mut data = AdditionalData::new();
    data.insert("round".to_string(), serde_json::json!(round));
    monitor.end(token, data);

    let start_time = monitor.now_ms();
    long_tasks.report(LongTaskEvent::new(start_time, 60.0 + round as f64 * 40.0).with_attribution("workload"));
}
