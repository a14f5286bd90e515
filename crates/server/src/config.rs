//! Configuration loading for the server binary.
//!
//! Layered the usual way: the YAML bundle file (when present) provides the
//! base, `ANCHORA__`-prefixed environment variables override individual keys
//! (`ANCHORA__RETRIEVAL__TOP_K=8`), and `.env` files are honoured via
//! dotenvy in `main`.

use std::path::Path;

use anchora::EngineConfig;

/// Load the engine configuration.
///
/// With `path` set, that file is required; otherwise `anchora.yaml` in the
/// working directory is used when present and pure defaults apply when not.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut builder = config::Config::builder();

    builder = match path {
        Some(path) => builder.add_source(
            config::File::from(path).format(config::FileFormat::Yaml),
        ),
        None => builder.add_source(
            config::File::with_name("anchora")
                .format(config::FileFormat::Yaml)
                .required(false),
        ),
    };

    let settings = builder
        .add_source(config::Environment::with_prefix("ANCHORA").separator("__"))
        .build()?;

    let engine: EngineConfig = settings.try_deserialize()?;
    engine.validate()?;
    Ok(engine)
}
