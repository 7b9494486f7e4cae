use crate::error::AppError;
use config::{Config as Cfg, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::de::DeserializeOwned;

/// Default config file looked up next to the binary (any supported extension).
pub const DEFAULT_CONFIG_FILE: &str = "configuration";

/// Load a layered configuration.
///
/// Sources, lowest precedence first: the `defaults` closure, the optional
/// `configuration.{toml,yaml,json}` file, then environment variables named
/// `<PREFIX>__SECTION__KEY`. A `.env` file is read first if present.
pub fn load<T, F>(env_prefix: &str, defaults: F) -> Result<T, AppError>
where
    T: DeserializeOwned,
    F: FnOnce(ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, config::ConfigError>,
{
    dotenvy::dotenv().ok();

    let builder = defaults(Cfg::builder())?;
    let config = builder
        .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
