use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::extract::Method;

/// Generate desktop theme files from an image's color palette.
#[derive(Parser, Debug, Default)]
#[command(name = "paletteer", version, about)]
pub struct Args {
    /// Path to the input image
    pub image: PathBuf,

    /// Alpha value for RGBA colors (0.0-1.0, overrides the config)
    #[arg(short, long, value_parser = parse_alpha)]
    pub alpha: Option<f32>,

    /// Print the generated color palette to the terminal
    #[arg(short, long)]
    pub preview: bool,

    /// Enable verbose output and full error details
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of colors to extract (overrides the config)
    #[arg(long)]
    pub count: Option<usize>,

    /// Sample every Nth pixel; larger is faster but coarser (overrides the config)
    #[arg(long)]
    pub quality: Option<u32>,

    /// Palette extraction method (overrides the config)
    #[arg(long, value_enum)]
    pub method: Option<Method>,

    /// Keep rendering remaining templates after a failure and report at the end
    #[arg(long)]
    pub continue_on_error: bool,
}

fn parse_alpha(value: &str) -> Result<f32, String> {
    let alpha: f32 = value
        .parse()
        .map_err(|_| format!("invalid alpha value: {value}"))?;
    if !(0.0..=1.0).contains(&alpha) {
        return Err(format!(
            "alpha value must be between 0.0 and 1.0, got {alpha}"
        ));
    }
    Ok(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let args = Args::try_parse_from(["paletteer", "wall.png"]).unwrap();
        assert_eq!(args.image, PathBuf::from("wall.png"));
        assert!(args.alpha.is_none());
        assert!(!args.preview);
        assert!(!args.verbose);
    }

    #[test]
    fn parses_all_flags() {
        let args = Args::try_parse_from([
            "paletteer",
            "wall.png",
            "-a",
            "0.8",
            "-p",
            "-v",
            "--config",
            "cfg.toml",
            "--count",
            "8",
            "--quality",
            "3",
            "--method",
            "kmeans",
            "--continue-on-error",
        ])
        .unwrap();
        assert_eq!(args.alpha, Some(0.8));
        assert!(args.preview && args.verbose && args.continue_on_error);
        assert_eq!(args.config, Some(PathBuf::from("cfg.toml")));
        assert_eq!(args.count, Some(8));
        assert_eq!(args.quality, Some(3));
        assert_eq!(args.method, Some(Method::Kmeans));
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        assert!(Args::try_parse_from(["paletteer", "wall.png", "--alpha", "1.5"]).is_err());
        assert!(Args::try_parse_from(["paletteer", "wall.png", "--alpha", "abc"]).is_err());
    }

    #[test]
    fn image_is_required() {
        assert!(Args::try_parse_from(["paletteer"]).is_err());
    }
}
