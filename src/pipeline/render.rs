//! Template rendering.
//!
//! Templates use Jinja syntax (via MiniJinja). Every palette slot is exposed
//! as a top-level variable holding its hex value, alongside structured views
//! of the whole palette:
//!
//! | variable  | value                                            |
//! |-----------|--------------------------------------------------|
//! | `<slot>`  | `#rrggbb`; `-` in slot names is also exposed as `_` |
//! | `palette` | map slot name (both spellings) → `#rrggbb`        |
//! | `rgba`    | map slot name (both spellings) → `rgba(r,g,b,a)`  |
//! | `hexa`    | map slot name (both spellings) → `#rrggbbaa`      |
//! | `colors`  | list of `#rrggbb` in slot order                   |
//! | `slots`   | list of `{name, hex, rgba, hexa, rgb}` objects    |
//! | `alpha`   | the run's alpha value                             |
//!
//! Configured extra variables fill in any remaining names. The `rgba`, `hexa`
//! and `rgb` filters convert a hex string, e.g. `{{ primary | rgba(0.8) }}`.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, warn};
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior, Value};
use serde::Serialize;

use crate::color::{clamp_alpha, Color};
use crate::error::{Error, Result};
use crate::pipeline::assign::Palette;

/// Context names that slots and extra variables cannot take.
pub const RESERVED: [&str; 6] = ["palette", "rgba", "hexa", "colors", "slots", "alpha"];

#[derive(Debug, Serialize)]
struct SlotValue {
    name: String,
    hex: String,
    rgba: String,
    hexa: String,
    rgb: String,
}

/// Renders templates against one palette.
pub struct TemplateRenderer {
    env: Environment<'static>,
    context: BTreeMap<String, Value>,
}

impl TemplateRenderer {
    pub fn new(palette: &Palette, alpha: f32, variables: &BTreeMap<String, String>) -> Self {
        let alpha = clamp_alpha(alpha);
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        // Spans and source snapshots on errors, used to name missing variables.
        env.set_debug(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        register_filters(&mut env, alpha);

        Self {
            env,
            context: build_context(palette, alpha, variables),
        }
    }

    /// Resolve `{% include %}` and `{% extends %}` relative to `dir`.
    pub fn with_template_dir(mut self, dir: &Path) -> Self {
        self.env.set_loader(minijinja::path_loader(dir));
        self
    }

    /// Read and render the template file at `path`.
    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let source = std::fs::read_to_string(path).map_err(|source| Error::TemplateRead {
            template: path.to_path_buf(),
            source,
        })?;
        self.render(path, &source)
    }

    /// Render `source`, reporting errors against `template`.
    pub fn render(&mut self, template: &Path, source: &str) -> Result<String> {
        let name = template.display().to_string();
        debug!("rendering template {name}");
        self.env
            .add_template_owned(name.clone(), source.to_owned())
            .map_err(|err| template_error(template, err))?;
        let tmpl = self
            .env
            .get_template(&name)
            .map_err(|err| template_error(template, err))?;

        tmpl.render(&self.context).map_err(|err| {
            if err.kind() == ErrorKind::UndefinedError {
                Error::UndefinedVariable {
                    name: self.missing_variable(&err, &name, source),
                    template: template.to_path_buf(),
                }
            } else {
                template_error(template, err)
            }
        })
    }

    /// Name the variable behind an undefined-value error.
    ///
    /// The error's span locates the failing expression; of the variables the
    /// failing template references, the first unresolved one inside that
    /// expression is reported. Falls back to the expression text itself.
    fn missing_variable(&self, err: &minijinja::Error, name: &str, source: &str) -> String {
        let failing = err.name().unwrap_or(name);
        let source = match err.template_source() {
            Some(src) => src,
            None if failing == name => source,
            None => return describe(err),
        };
        let expr = err
            .range()
            .and_then(|range| source.get(range))
            .or_else(|| err.line().and_then(|line| source.lines().nth(line - 1)));
        let Some(expr) = expr else {
            return describe(err);
        };

        let referenced = self
            .env
            .get_template(failing)
            .map(|tmpl| tmpl.undeclared_variables(true))
            .unwrap_or_default();
        referenced
            .into_iter()
            .filter(|path| !self.resolves(path))
            .filter_map(|path| find_path(expr, &path).map(|pos| (pos, path)))
            .min()
            .map(|(_, path)| path)
            .unwrap_or_else(|| expr.trim().to_string())
    }

    /// Whether a dotted variable path evaluates to a defined value.
    fn resolves(&self, path: &str) -> bool {
        self.env
            .compile_expression_owned(path.to_owned())
            .and_then(|expr| expr.eval(&self.context))
            .is_ok_and(|value| !value.is_undefined())
    }
}

fn describe(err: &minijinja::Error) -> String {
    let expr = err.detail().unwrap_or("undefined value");
    match err.line() {
        Some(line) => format!("{expr} (line {line})"),
        None => expr.to_string(),
    }
}

/// Byte offset of the first standalone occurrence of `path` in `expr`.
fn find_path(expr: &str, path: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    expr.match_indices(path).map(|(pos, _)| pos).find(|&pos| {
        let before = expr[..pos].chars().next_back();
        let after = expr[pos + path.len()..].chars().next();
        !before.is_some_and(|c| is_ident(c) || c == '.') && !after.is_some_and(is_ident)
    })
}

fn template_error(template: &Path, source: minijinja::Error) -> Error {
    let template = template.to_path_buf();
    if source.kind() == ErrorKind::SyntaxError {
        Error::TemplateSyntax { template, source }
    } else {
        Error::TemplateRender { template, source }
    }
}

/// Identifiers a slot is reachable under at the top level.
fn identifiers(slot: &str) -> Vec<String> {
    let underscored = slot.replace('-', "_");
    if underscored == slot {
        vec![slot.to_string()]
    } else {
        vec![slot.to_string(), underscored]
    }
}

fn build_context(
    palette: &Palette,
    alpha: f32,
    variables: &BTreeMap<String, String>,
) -> BTreeMap<String, Value> {
    let mut hex = BTreeMap::new();
    let mut rgba = BTreeMap::new();
    let mut hexa = BTreeMap::new();
    let mut colors = Vec::with_capacity(palette.len());
    let mut slots = Vec::with_capacity(palette.len());

    for (name, color) in palette.iter() {
        for key in identifiers(name) {
            hex.insert(key.clone(), color.to_hex());
            rgba.insert(key.clone(), color.to_rgba(alpha));
            hexa.insert(key, color.to_hexa(alpha));
        }
        colors.push(color.to_hex());
        slots.push(SlotValue {
            name: name.to_string(),
            hex: color.to_hex(),
            rgba: color.to_rgba(alpha),
            hexa: color.to_hexa(alpha),
            rgb: color.to_rgb_triplet(),
        });
    }

    let mut context = BTreeMap::new();
    context.insert("palette".to_string(), Value::from_serialize(&hex));
    context.insert("rgba".to_string(), Value::from_serialize(&rgba));
    context.insert("hexa".to_string(), Value::from_serialize(&hexa));
    context.insert("colors".to_string(), Value::from_serialize(&colors));
    context.insert("slots".to_string(), Value::from_serialize(&slots));
    // Round-trip through the f32's shortest form so 0.8 renders as 0.8.
    let alpha_value: f64 = alpha.to_string().parse().unwrap_or(1.0);
    context.insert("alpha".to_string(), Value::from(alpha_value));

    for (name, color) in palette.iter() {
        for key in identifiers(name) {
            if context.contains_key(&key) {
                warn!("palette slot '{name}' is shadowed by the built-in variable '{key}'");
                continue;
            }
            context.insert(key, Value::from(color.to_hex()));
        }
    }

    for (key, value) in variables {
        if context.contains_key(key) {
            warn!("variable '{key}' is ignored: the name is taken by the palette");
            continue;
        }
        context.insert(key.clone(), Value::from(value.as_str()));
    }

    context
}

fn parse_hex(value: &str) -> std::result::Result<Color, minijinja::Error> {
    Color::from_hex(value).map_err(|e| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("'{value}' is not a hex color: {e}"),
        )
    })
}

/// Registers the color conversion filters. `alpha` is the default for the
/// filters that take an optional alpha argument.
fn register_filters(env: &mut Environment<'static>, alpha: f32) {
    env.add_filter(
        "rgba",
        move |value: String, a: Option<f32>| -> std::result::Result<String, minijinja::Error> {
            Ok(parse_hex(&value)?.to_rgba(a.unwrap_or(alpha)))
        },
    );
    env.add_filter(
        "hexa",
        move |value: String, a: Option<f32>| -> std::result::Result<String, minijinja::Error> {
            Ok(parse_hex(&value)?.to_hexa(a.unwrap_or(alpha)))
        },
    );
    env.add_filter(
        "rgb",
        |value: String| -> std::result::Result<String, minijinja::Error> {
            Ok(parse_hex(&value)?.to_rgb_triplet())
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assign::{build_palette, Fallback, SlotScheme};
    use std::path::PathBuf;

    fn palette() -> Palette {
        build_palette(
            &[Color::new(255, 0, 0), Color::new(0, 255, 0)],
            2,
            &SlotScheme::Accents,
            Fallback::None,
        )
        .unwrap()
    }

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(&palette(), 0.5, &BTreeMap::new())
    }

    fn render(source: &str) -> Result<String> {
        renderer().render(Path::new("test.conf.j2"), source)
    }

    #[test]
    fn literal_text_is_unchanged() {
        let text = "font-size: 12px;\nborder: none;\n\n";
        assert_eq!(render(text).unwrap(), text);
    }

    #[test]
    fn substitutes_slot_hex() {
        assert_eq!(render("background={{primary}}").unwrap(), "background=#ff0000");
    }

    #[test]
    fn hyphenated_slots_are_reachable() {
        let out = render(r#"{{ accent_1 }} {{ palette["accent-1"] }}"#).unwrap();
        assert_eq!(out, "#00ff00 #00ff00");
    }

    #[test]
    fn structured_views() {
        assert_eq!(render("{{ rgba.primary }}").unwrap(), "rgba(255,0,0,0.5)");
        assert_eq!(render("{{ hexa.primary }}").unwrap(), "#ff00007f");
        assert_eq!(render("{{ rgba.accent_1 }}").unwrap(), "rgba(0,255,0,0.5)");
        assert_eq!(render("{{ colors[1] }}").unwrap(), "#00ff00");
        assert_eq!(render("{{ alpha }}").unwrap(), "0.5");
        assert_eq!(
            render("{% for s in slots %}{{ s.name }}={{ s.rgb }};{% endfor %}").unwrap(),
            "primary=255,0,0;accent-1=0,255,0;"
        );
    }

    #[test]
    fn color_filters() {
        assert_eq!(render("{{ primary | rgba }}").unwrap(), "rgba(255,0,0,0.5)");
        assert_eq!(render("{{ primary | rgba(1) }}").unwrap(), "rgba(255,0,0,1)");
        assert_eq!(render("{{ accent_1 | hexa(0.0) }}").unwrap(), "#00ff0000");
        assert_eq!(render("{{ '#0a0b0c' | rgb }}").unwrap(), "10,11,12");
    }

    #[test]
    fn filter_rejects_non_hex_input() {
        let err = render("{{ 'navy' | rgba }}").unwrap_err();
        assert!(matches!(err, Error::TemplateRender { .. }), "got: {err}");
    }

    #[test]
    fn missing_variable_is_named() {
        let err = render("fg={{ secondary }}").unwrap_err();
        match err {
            Error::UndefinedVariable { name, template } => {
                assert_eq!(name, "secondary");
                assert_eq!(template, PathBuf::from("test.conf.j2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_nested_variable_is_named() {
        let err = render("{{ rgba.accent_9 }}").unwrap_err();
        assert!(
            matches!(err, Error::UndefinedVariable { ref name, .. } if name == "rgba.accent_9"),
            "got: {err}"
        );
    }

    fn missing_name(source: &str) -> String {
        match render(source).unwrap_err() {
            Error::UndefinedVariable { name, .. } => name,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_variable_ignores_guarded_references() {
        let source = "{% if accent_4 is defined %}{{ accent_4 }}{% endif %}font={{ font }}";
        assert_eq!(missing_name(source), "font");
    }

    #[test]
    fn missing_variable_ignores_dead_branches() {
        assert_eq!(missing_name("{% if false %}{{ aaa }}{% endif %}{{ zzz }}"), "zzz");
    }

    #[test]
    fn missing_variable_on_later_line() {
        let source = "{{ primary }}\n\
                      {% if unused is defined %}{{ unused }}{% endif %}\n\
                      fg={{ secondary }}\n";
        assert_eq!(missing_name(source), "secondary");
    }

    #[test]
    fn missing_variable_in_included_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part.j2"), "{{ accent_1 }} {{ border }}").unwrap();
        let mut renderer = renderer().with_template_dir(dir.path());

        let err = renderer
            .render(
                Path::new("main.j2"),
                "{% if aaa is defined %}{{ aaa }}{% endif %}{% include 'part.j2' %}",
            )
            .unwrap_err();
        assert!(
            matches!(err, Error::UndefinedVariable { ref name, .. } if name == "border"),
            "got: {err}"
        );
    }

    #[test]
    fn syntax_error_is_reported() {
        let err = render("{{ primary ").unwrap_err();
        assert!(matches!(err, Error::TemplateSyntax { .. }), "got: {err}");
    }

    #[test]
    fn extra_variables_do_not_override_palette() {
        let mut vars = BTreeMap::new();
        vars.insert("font".to_string(), "Iosevka".to_string());
        vars.insert("primary".to_string(), "#123456".to_string());
        let mut renderer = TemplateRenderer::new(&palette(), 1.0, &vars);

        let out = renderer
            .render(Path::new("t"), "{{ font }} {{ primary }}")
            .unwrap();
        assert_eq!(out, "Iosevka #ff0000");
    }

    #[test]
    fn render_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.css.j2");
        std::fs::write(&path, "* { color: {{ primary }}; }\n").unwrap();

        let out = renderer().render_file(&path).unwrap();
        assert_eq!(out, "* { color: #ff0000; }\n");
    }

    #[test]
    fn render_file_missing_template() {
        let err = renderer()
            .render_file(Path::new("/nonexistent/template.j2"))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateRead { .. }), "got: {err}");
    }

    #[test]
    fn includes_resolve_against_template_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("colors.j2"), "fg={{ accent_1 }}").unwrap();
        let mut renderer = renderer().with_template_dir(dir.path());

        let out = renderer
            .render(Path::new("main.j2"), "bg={{ primary }}\n{% include 'colors.j2' %}")
            .unwrap();
        assert_eq!(out, "bg=#ff0000\nfg=#00ff00");
    }

    #[test]
    fn context_exposes_both_slot_spellings() {
        let renderer = renderer();
        let ctx = &renderer.context;
        assert!(ctx.contains_key("accent-1"));
        assert!(ctx.contains_key("accent_1"));
        assert!(ctx.contains_key("primary"));
    }
}
