//! Run configuration.
//!
//! Values are layered: the TOML file, then `PALETTEER__SECTION__KEY`
//! environment variables, then command line flags. The merged result is
//! validated once and frozen into a [`RunConfig`].

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::Deserialize;

use crate::cli::Args;
use crate::error::{Error, Result};
use crate::pipeline::assign::{Fallback, SlotScheme};
use crate::pipeline::extract::{ExtractParams, Method};
use crate::pipeline::render::RESERVED;

const APPLICATION: &str = "paletteer";
const CONFIG_DIR_ENV: &str = "PALETTEER_CONFIG_DIR";
const ENV_PREFIX: &str = "PALETTEER";
const CONFIG_FILE: &str = "config.toml";

pub const MAX_COUNT: i64 = 20;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    colors: ColorsSection,
    palette: PaletteSection,
    files: FilesSection,
    variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ColorsSection {
    count: Option<i64>,
    quality: Option<i64>,
    alpha: Option<f32>,
    method: Option<Method>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SchemeName {
    #[default]
    Accents,
    Lightness,
    Custom,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PaletteSection {
    scheme: SchemeName,
    names: Vec<String>,
    fallback: Fallback,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FilesSection {
    template_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    final_dir: Option<PathBuf>,
    continue_on_error: bool,
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TemplateEntry {
    source: PathBuf,
    output: PathBuf,
}

/// A template and where its rendered output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Second copy of the output under `files.final_dir`, when configured.
    pub install: Option<PathBuf>,
}

/// Everything one run needs, read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub image: PathBuf,
    pub extract: ExtractParams,
    pub alpha: f32,
    pub scheme: SlotScheme,
    pub fallback: Fallback,
    pub template_dir: PathBuf,
    pub templates: Vec<TemplateSpec>,
    pub continue_on_error: bool,
    pub variables: BTreeMap<String, String>,
    pub preview: bool,
    pub verbose: bool,
}

impl RunConfig {
    /// Locate, read and validate the configuration for `args`.
    pub fn load(args: &Args) -> Result<Self> {
        let path = config_path(args)?;
        debug!("loading configuration from {}", path.display());
        let builder = Config::builder()
            .add_source(File::from(path.clone()).format(FileFormat::Toml).required(true))
            .add_source(env_source());
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_builder(builder, &base, args)
            .map_err(|e| prefix_error(e, &path))
    }

    /// Build from TOML text; relative paths resolve against `base`.
    pub fn from_toml_str(toml: &str, base: &Path, args: &Args) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::from_builder(builder, base, args)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        base: &Path,
        args: &Args,
    ) -> Result<Self> {
        let raw: RawConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| Error::Config(e.to_string()))?;
        raw.resolve(base, args)
    }
}

fn prefix_error(err: Error, path: &Path) -> Error {
    match err {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

/// The file named by `--config`, or `config.toml` in the config directory.
pub fn config_path(args: &Args) -> Result<PathBuf> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => config_dir()?.join(CONFIG_FILE),
    };
    if !path.is_file() {
        return Err(Error::Config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// `$PALETTEER_CONFIG_DIR`, else the platform configuration directory.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("", "", APPLICATION)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| Error::Config("unable to determine the configuration directory".into()))
}

impl RawConfig {
    fn apply_cli_overrides(&mut self, args: &Args) {
        if let Some(count) = args.count {
            self.colors.count = Some(i64::try_from(count).unwrap_or(i64::MAX));
        }
        if let Some(quality) = args.quality {
            self.colors.quality = Some(i64::from(quality));
        }
        if let Some(alpha) = args.alpha {
            self.colors.alpha = Some(alpha);
        }
        if let Some(method) = args.method {
            self.colors.method = Some(method);
        }
        self.files.continue_on_error |= args.continue_on_error;
    }

    fn resolve(mut self, base: &Path, args: &Args) -> Result<RunConfig> {
        self.apply_cli_overrides(args);
        let mut errors = Vec::new();

        let count = match self.colors.count {
            None => {
                errors.push("missing required 'colors.count'".to_string());
                1
            }
            Some(n) if n <= 0 => {
                errors.push("colors.count must be a positive integer".to_string());
                1
            }
            Some(n) if n > MAX_COUNT => {
                errors.push(format!("colors.count too large (max: {MAX_COUNT})"));
                1
            }
            Some(n) => n as usize,
        };

        let quality = match self.colors.quality {
            None => {
                errors.push("missing required 'colors.quality'".to_string());
                1
            }
            Some(q) if q < 1 || q > i64::from(u32::MAX) => {
                errors.push("colors.quality must be a positive integer".to_string());
                1
            }
            Some(q) => q as u32,
        };

        let alpha = self.colors.alpha.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&alpha) {
            errors.push(format!("colors.alpha must be between 0.0 and 1.0, got {alpha}"));
        }

        if self.files.templates.is_empty() {
            errors.push("files.templates cannot be empty".to_string());
        }

        let scheme = match self.palette.scheme {
            SchemeName::Accents => SlotScheme::Accents,
            SchemeName::Lightness => SlotScheme::Lightness,
            SchemeName::Custom => {
                errors.extend(check_custom_names(&self.palette.names, count));
                SlotScheme::Custom(self.palette.names.clone())
            }
        };
        if self.palette.scheme != SchemeName::Custom && !self.palette.names.is_empty() {
            warn!("palette.names is only used with scheme = \"custom\"; ignoring it");
        }

        if !errors.is_empty() {
            let list: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
            return Err(Error::Config(format!(
                "invalid configuration:\n{}",
                list.join("\n")
            )));
        }

        let template_dir = base.join(self.files.template_dir.unwrap_or_else(|| "templates".into()));
        let output_dir = base.join(self.files.output_dir.unwrap_or_else(|| "output".into()));
        let final_dir = self.files.final_dir.map(|dir| base.join(dir));
        let templates = self
            .files
            .templates
            .into_iter()
            .map(|t| TemplateSpec {
                install: final_dir.as_deref().map(|dir| install_path(dir, &t.output)),
                source: template_dir.join(t.source),
                output: output_dir.join(t.output),
            })
            .collect();

        Ok(RunConfig {
            image: args.image.clone(),
            extract: ExtractParams {
                count,
                quality,
                method: self.colors.method.unwrap_or_default(),
            },
            alpha,
            scheme,
            fallback: self.palette.fallback,
            template_dir,
            templates,
            continue_on_error: self.files.continue_on_error,
            variables: self.variables,
            preview: args.preview,
            verbose: args.verbose,
        })
    }
}

/// Where `output` lands under `final_dir`: relative outputs keep their
/// layout, absolute ones keep only the file name.
fn install_path(final_dir: &Path, output: &Path) -> PathBuf {
    if output.is_absolute() {
        final_dir.join(output.file_name().unwrap_or(output.as_os_str()))
    } else {
        final_dir.join(output)
    }
}

fn check_custom_names(names: &[String], count: usize) -> Vec<String> {
    let mut errors = Vec::new();
    if names.len() != count {
        errors.push(format!(
            "palette.names has {} entries but colors.count is {count}",
            names.len()
        ));
    }
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            errors.push("palette.names cannot contain an empty name".to_string());
        } else if RESERVED.contains(&name.as_str()) {
            errors.push(format!("palette name '{name}' is reserved"));
        } else if !seen.insert(name.as_str()) {
            errors.push(format!("duplicate palette name '{name}'"));
        }
    }
    errors
}
