use std::path::PathBuf;

/// Errors surfaced by the palette pipeline.
///
/// Every variant names the file or variable it concerns so the CLI can report
/// it without further context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read image {}: {reason}", path.display())]
    ImageRead {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<image::ImageError>,
    },

    #[error("no color available for slot '{slot}' ({available} of {required} colors extracted)")]
    InsufficientColors {
        slot: String,
        required: usize,
        available: usize,
    },

    #[error("undefined variable '{name}' in template {}", template.display())]
    UndefinedVariable { name: String, template: PathBuf },

    #[error("template syntax error in {}", template.display())]
    TemplateSyntax {
        template: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to render template {}", template.display())]
    TemplateRender {
        template: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error("cannot read template {}", template.display())]
    TemplateRead {
        template: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
