use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use leadops_core::config::Config;

use crate::error::DispatcherError;
use crate::usecase::backoff::BackoffPolicy;

/// Dispatcher service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// TCP port to listen on (default 3120). Env var: `DISPATCHER_PORT`.
    #[serde(default = "default_port")]
    pub dispatcher_port: u16,
    /// Secret the scheduler and automation system send in `x-webhook-secret`.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Base URL of the external automation endpoint; envelopes go to `{url}/events`.
    #[serde(default)]
    pub automation_url: Option<String>,
    /// Secret sent to the automation endpoint in `x-webhook-secret`.
    #[serde(default)]
    pub automation_secret: Option<String>,
    /// Tag included in every envelope.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_batch_size")]
    pub dispatch_batch_size: u64,
    #[serde(default = "default_max_retries")]
    pub dispatch_max_retries: i32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Per-request timeout for outbound deliveries.
    #[serde(default = "default_timeout_secs")]
    pub dispatch_timeout_secs: u64,
    /// Tables a callback may insert/update/upsert (comma-separated).
    #[serde(default)]
    pub callback_tables: Vec<String>,
    /// Database functions a callback may call (comma-separated).
    #[serde(default)]
    pub callback_functions: Vec<String>,
}

impl Config for DispatcherConfig {}

fn default_port() -> u16 {
    3120
}

fn default_app_name() -> String {
    "leadops".to_owned()
}

fn default_batch_size() -> u64 {
    25
}

fn default_max_retries() -> i32 {
    8
}

fn default_backoff_base_secs() -> u64 {
    10
}

fn default_backoff_cap_secs() -> u64 {
    600
}

fn default_timeout_secs() -> u64 {
    15
}

/// Tunables for one dispatcher invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub batch_size: u64,
    pub max_retries: i32,
    pub backoff: BackoffPolicy,
}

/// Where and how envelopes are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkTarget {
    pub base_url: String,
    pub secret: String,
    pub app_name: String,
    pub timeout: Duration,
}

/// Names a callback is allowed to touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideEffectAllowList {
    pub tables: BTreeSet<String>,
    pub functions: BTreeSet<String>,
}

impl SideEffectAllowList {
    pub fn new<T, F>(tables: T, functions: F) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            tables: normalize(tables),
            functions: normalize(functions),
        }
    }

    pub fn allows_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn allows_function(&self, function: &str) -> bool {
        self.functions.contains(function)
    }
}

fn normalize<I>(names: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_owned())
        .filter(|n| !n.is_empty())
        .collect()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl DispatcherConfig {
    pub fn webhook_secret(&self) -> Option<&str> {
        non_blank(&self.webhook_secret)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            batch_size: self.dispatch_batch_size.max(1),
            max_retries: self.dispatch_max_retries,
            backoff: BackoffPolicy::new(self.backoff_base_secs, self.backoff_cap_secs),
        }
    }

    /// Fails when the endpoint or its secret is missing: nothing could be delivered.
    pub fn sink_target(&self) -> Result<SinkTarget, DispatcherError> {
        let base_url =
            non_blank(&self.automation_url).ok_or(DispatcherError::MissingConfig("AUTOMATION_URL"))?;
        let secret = non_blank(&self.automation_secret)
            .ok_or(DispatcherError::MissingConfig("AUTOMATION_SECRET"))?;
        Ok(SinkTarget {
            base_url: base_url.trim_end_matches('/').to_owned(),
            secret: secret.to_owned(),
            app_name: self.app_name.clone(),
            timeout: Duration::from_secs(self.dispatch_timeout_secs.max(1)),
        })
    }

    pub fn allow_list(&self) -> SideEffectAllowList {
        SideEffectAllowList::new(&self.callback_tables, &self.callback_functions)
    }
}
