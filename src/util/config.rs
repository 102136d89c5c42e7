use anyhow::Result;
use std::{sync::OnceLock, time::Duration};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, FileFormat};

use crate::{
    device::{model::SPARKFUN_WEATHER_SHIELD, DeviceSettings},
    poll_service::ServiceSettings,
};

pub fn get_config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();

    CONFIG.get_or_init(|| build_config().expect("Configuration error"))
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("device_path", "/dev/ttyACM0")?
        .set_default("device_model", SPARKFUN_WEATHER_SHIELD)?
        .set_default("rpc_addr", "127.0.0.1:50051")?
        .set_default("warmup_settle_secs", 5)?)
}

fn build_config() -> Result<Config> {
    Ok(defaults()?
        .add_source(config::Environment::with_prefix("TPOLLER"))
        .add_source(config::File::new("tpoller.toml", FileFormat::Toml).required(false))
        .build()?)
}

pub fn device_settings() -> Result<DeviceSettings> {
    device_settings_from(get_config())
}

pub fn service_settings() -> Result<ServiceSettings> {
    service_settings_from(get_config())
}

fn device_settings_from(config: &Config) -> Result<DeviceSettings> {
    Ok(DeviceSettings {
        path: config.get_string("device_path")?,
        model: config.get_string("device_model")?,
        warmup_settle: Duration::from_secs(config.get_int("warmup_settle_secs")?.try_into()?),
        read_timeout: optional_millis(config, "device_read_timeout_ms")?,
    })
}

fn service_settings_from(config: &Config) -> Result<ServiceSettings> {
    Ok(ServiceSettings {
        gate_wait_timeout: optional_millis(config, "gate_wait_timeout_ms")?,
    })
}

/// Unset keys mean "wait forever".
fn optional_millis(config: &Config, key: &str) -> Result<Option<Duration>> {
    match config.get_int(key) {
        Ok(millis) => Ok(Some(Duration::from_millis(millis.try_into()?))),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
