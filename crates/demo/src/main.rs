//! Demo entry point.

use demo::config::Config;
use demo::error::DemoError;
use demo::scenarios;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    tracing::info!(?config, "starting demo");

    // 3. Fire-and-forget SMS batch
    let report = scenarios::run_sms_batch(&config).await?;
    for (kind, count) in &report.failed {
        tracing::info!(kind, count, "sms failures");
    }

    // 4. One successful and one compensated order saga
    for saga in scenarios::run_order_sagas(&config).await? {
        match saga.failed_step {
            None => tracing::info!(order_id = %saga.order_id, "saga completed"),
            Some(step) => tracing::info!(order_id = %saga.order_id, %step, "saga compensated"),
        }
    }

    println!("{}", metrics_handle.render());
    Ok(())
}
