use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;

use crate::reasoning::{
    CloudProvider, LocalProvider, ReasoningProvider, ResilientClient, Responder, RetryPolicy,
};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub capture: CaptureSettings,
    pub transcribe: TranscribeSettings,
    pub reasoning: ReasoningSettings,
}

#[derive(Debug, Deserialize)]
pub struct CaptureSettings {
    /// Microphone device name (None = host default)
    pub microphone_device: Option<String>,
    /// Virtual loopback device identifier for system audio
    pub loopback_device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeSettings {
    pub nats_url: String,
    pub language_code: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Cloud,
    Local,
}

#[derive(Debug, Deserialize)]
pub struct ReasoningSettings {
    /// Which provider variant to construct; fixed for the process lifetime
    pub provider: ProviderKind,
    pub endpoint: String,
    /// API key for the cloud provider; unused by the local provider
    pub api_key: Option<String>,
    pub primary_model: String,
    pub fallback_model: Option<String>,
}

impl ReasoningSettings {
    /// Construct the configured provider variant. The choice is fixed
    /// for the process lifetime.
    pub fn build_provider(&self) -> Arc<dyn ReasoningProvider> {
        match self.provider {
            ProviderKind::Cloud => Arc::new(CloudProvider::new(
                self.endpoint.clone(),
                self.api_key.clone().unwrap_or_default(),
            )),
            ProviderKind::Local => Arc::new(LocalProvider::new(self.endpoint.clone())),
        }
    }

    /// Retry policy for this configuration: calls backed by a fallback
    /// model use the short general schedule, no-fallback configurations
    /// the narrow doubling schedule, since they must wait out overload
    /// windows on their own.
    pub fn retry_policy(&self) -> RetryPolicy {
        if self.fallback_model.is_some() {
            RetryPolicy::general()
        } else {
            RetryPolicy::narrow()
        }
    }

    pub fn build_client(&self) -> ResilientClient {
        ResilientClient::new(
            self.build_provider(),
            self.retry_policy(),
            self.fallback_model.clone(),
        )
    }

    pub fn build_responder(&self) -> Responder {
        Responder::new(self.build_client())
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PARLEY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
