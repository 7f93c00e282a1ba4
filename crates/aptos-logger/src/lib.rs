// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging facade. Every component constructs its own logger-free
//! collaborators (per the resilience-context pattern — see `sequencer-resilience`)
//! and logs through this module's macros rather than a global singleton, so tests
//! can run many nodes in one process without log line interleaving becoming
//! unreadable.
//!
//! Re-exports [`tracing`]'s level macros under Aptos-style names and adds
//! [`Schema`], a derive that turns a struct into a set of structured fields.

pub use aptos_log_derive::Schema;
pub use tracing::{debug, error, info, trace, warn};

use once_cell::sync::OnceCell;
use std::io::IsTerminal;

static INIT: OnceCell<()> = OnceCell::new();

/// JSON vs human-readable text, matching what the deployment environment wants:
/// JSON when logs are shipped to a collector, text when a human is watching a
/// terminal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Json,
    Text,
}

pub struct LoggerConfig {
    pub format: LogFormat,
    pub level: tracing::Level,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: if std::io::stdout().is_terminal() {
                LogFormat::Text
            } else {
                LogFormat::Json
            },
            level: tracing::Level::INFO,
        }
    }
}

/// Installs the global `tracing` subscriber. Idempotent: a node that calls this
/// more than once (e.g. in overlapping integration tests within one process)
/// does not panic on the second attempt.
pub fn init(config: LoggerConfig) {
    INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(config.level.into())
            .from_env_lossy();
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        match config.format {
            LogFormat::Json => {
                let _ = subscriber.json().try_init();
            }
            LogFormat::Text => {
                let _ = subscriber.try_init();
            }
        }
    });
}

/// Renders a [`Schema::schema`] vector as `key=value, key=value`, used by
/// components that log a structured event through `tracing::info!("{}", ...)`
/// rather than one `tracing` field per struct member.
pub fn render_schema(fields: &[(&'static str, serde_json::Value)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use aptos_log_derive::Schema;
    use serde::Serialize;

    #[derive(Serialize, Schema)]
    struct ElectionTimeout {
        node_id: String,
        term: u64,
    }

    #[test]
    fn schema_derive_produces_named_fields() {
        let event = ElectionTimeout {
            node_id: "n1".into(),
            term: 7,
        };
        let rendered = render_schema(&event.schema());
        assert!(rendered.contains("node_id=\"n1\""));
        assert!(rendered.contains("term=7"));
    }

    #[test]
    fn init_is_idempotent() {
        init(LoggerConfig::default());
        init(LoggerConfig::default());
    }
}
