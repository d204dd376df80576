use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;

/// Load a layered configuration: optional `file_name` (any format the
/// `config` crate understands), then `{env_prefix}__SECTION__KEY` environment
/// overrides. Keys listed in `list_keys` are split on commas when they come
/// from the environment.
pub fn load<T>(file_name: &str, env_prefix: &str, list_keys: &[&str]) -> Result<T, AppError>
where
    T: DeserializeOwned,
{
    dotenvy::dotenv().ok();

    let mut environment = Environment::with_prefix(env_prefix)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true);

    if !list_keys.is_empty() {
        environment = environment.list_separator(",");
        for key in list_keys {
            environment = environment.with_list_parse_key(key);
        }
    }

    let config = Cfg::builder()
        .add_source(File::with_name(file_name).required(false))
        .add_source(environment)
        .build()?;

    Ok(config.try_deserialize()?)
}
