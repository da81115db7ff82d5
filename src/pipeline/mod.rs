pub mod assign;
pub mod extract;
pub mod output;
pub mod render;

use std::path::PathBuf;

use log::{info, warn};

use crate::color::Color;
use crate::config::{RunConfig, TemplateSpec};
use crate::error::{Error, Result};
use crate::preview;

use assign::{build_palette, Palette};
use extract::extract_colors;
use output::write_output;
use render::TemplateRenderer;

/// A template that could not be rendered or written.
#[derive(Debug)]
pub struct TemplateFailure {
    pub template: PathBuf,
    pub error: Error,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub palette: Palette,
    /// Outputs and their `final_dir` copies, in write order.
    pub written: Vec<PathBuf>,
    /// Only populated when `continue_on_error` is set.
    pub failures: Vec<TemplateFailure>,
}

/// Extract the palette, optionally preview it, then render and write every
/// configured template in order.
///
/// The first template failure aborts the run unless `continue_on_error` is
/// set, in which case failures are collected in the report.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let extracted = extract_colors(&config.image, &config.extract)?;
    let colors: Vec<Color> = extracted.iter().map(|c| c.color).collect();
    let palette = build_palette(&colors, config.extract.count, &config.scheme, config.fallback)?;
    info!("built palette with {} slots", palette.len());

    if config.preview {
        if let Err(err) = preview::print_palette(&palette) {
            warn!("palette preview failed: {err}");
        }
    }

    let mut renderer = TemplateRenderer::new(&palette, config.alpha, &config.variables)
        .with_template_dir(&config.template_dir);
    let mut written = Vec::new();
    let mut failures = Vec::new();

    for spec in &config.templates {
        match render_one(&mut renderer, spec) {
            Ok(paths) => {
                for path in paths {
                    info!("wrote {}", path.display());
                    written.push(path);
                }
            }
            Err(error) if config.continue_on_error => {
                warn!("skipping {}: {error}", spec.source.display());
                failures.push(TemplateFailure {
                    template: spec.source.clone(),
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }

    Ok(RunReport {
        palette,
        written,
        failures,
    })
}

/// Render one template and write it to its output, then to its install
/// location if it has one. Returns the paths written.
fn render_one(renderer: &mut TemplateRenderer, spec: &TemplateSpec) -> Result<Vec<PathBuf>> {
    let rendered = renderer.render_file(&spec.source)?;
    write_output(&spec.output, &rendered)?;
    let mut paths = vec![spec.output.clone()];
    if let Some(install) = &spec.install {
        write_output(install, &rendered)?;
        paths.push(install.clone());
    }
    Ok(paths)
}
