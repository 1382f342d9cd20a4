use crate::Config;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::Path;
use tracing::{debug, instrument};

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "APICAT_";
const ENV_SEPARATOR: &str = "__";

impl Config {
    /// The merged configuration layers, not yet extracted.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        layered(file, Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
    }

    /// Loads and validates the configuration, optionally from `file`.
    #[instrument(skip_all, fields(file = ?file))]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(file)?)
    }

    /// Extracts and validates a configuration from custom layers.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }
}

fn layered(file: Option<&Path>, env: Env) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(file) = file {
        if !file.is_file() {
            exn::bail!(ErrorKind::MissingFile(file.to_path_buf()));
        }
        let extension = file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        figment = match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file(file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
            Some("json") => figment.merge(Json::file(file)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
        };
    }
    Ok(figment.merge(env))
}
