use std::future::Future;

use dooi::{DooiClient, DooiConfig};
use tokio::runtime::Runtime;

use crate::error::CliError;
use crate::util::Verbosity;

/// Shared state for one CLI invocation: the configured client and a runtime to drive it.
pub struct CliSession {
    pub client: DooiClient,
    pub verbosity: Verbosity,
    runtime: Runtime,
}

impl CliSession {
    pub fn bootstrap(cli_override: Option<&str>, verbosity: Verbosity) -> Result<Self, CliError> {
        let mut config = DooiConfig::from_env();
        if let Some(command) = cli_override {
            config = config.with_cli_command(command);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client: DooiClient::new(config),
            verbosity,
            runtime,
        })
    }

    pub fn config(&self) -> &DooiConfig {
        self.client.config()
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
