use anyhow::Result;
use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;
use crate::metrics;

pub struct Observability {
    pub registry: Registry,
}

impl Observability {
    pub fn init(format: LogFormat) -> Result<Self> {
        let registry = Registry::new_custom(Some("movies".into()), None)?;
        metrics::register_all(&registry)?;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "movies_api=debug,tower_http=debug".into());

        let subscriber = tracing_subscriber::registry().with(env_filter);
        match format {
            LogFormat::Json => subscriber
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()?,
            LogFormat::Pretty => subscriber
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?,
        }

        tracing::info!(?format, "Observability stack initialized");
        Ok(Self { registry })
    }
}
