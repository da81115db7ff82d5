use std::collections::HashSet;

use log::debug;
use serde::Deserialize;

use crate::color::Color;
use crate::error::{Error, Result};

/// How extracted colors are named.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotScheme {
    /// `primary`, then `accent-1` .. `accent-(N-1)` in extraction order.
    #[default]
    Accents,
    /// Darkest color is `background`, lightest is `foreground`, the rest are
    /// `accent-1` .. in extraction order.
    Lightness,
    /// Caller supplied names, assigned in extraction order.
    Custom(Vec<String>),
}

/// What to do when fewer colors were extracted than the palette has slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fallback {
    /// Reuse the last extracted color for every missing slot.
    #[default]
    ReuseLast,
    /// Reuse extracted colors cyclically, starting over from the first.
    Cycle,
    /// Treat a missing color as an error.
    None,
}

/// Named color slots for one theme run, in slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    slots: Vec<(String, Color)>,
}

impl Palette {
    /// Look up a slot by name.
    pub fn get(&self, name: &str) -> Option<Color> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, color)| *color)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Color)> {
        self.slots.iter().map(|(name, color)| (name.as_str(), *color))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn accent(n: usize) -> String {
    format!("accent-{n}")
}

/// Slot name a scheme gives to position `index` before any reordering.
fn positional_name(scheme: &SlotScheme, index: usize) -> String {
    match scheme {
        SlotScheme::Accents if index == 0 => "primary".to_string(),
        SlotScheme::Accents => accent(index),
        SlotScheme::Lightness => match index {
            0 => "background".to_string(),
            1 => "foreground".to_string(),
            n => accent(n - 1),
        },
        SlotScheme::Custom(names) => names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("slot-{index}")),
    }
}

/// Build a palette of exactly `size` slots from colors in extraction order.
///
/// Missing colors are filled according to `fallback`. An empty extraction is
/// always an error since there is nothing to fall back on.
pub fn build_palette(
    colors: &[Color],
    size: usize,
    scheme: &SlotScheme,
    fallback: Fallback,
) -> Result<Palette> {
    if let SlotScheme::Custom(names) = scheme {
        if names.len() != size {
            return Err(Error::Config(format!(
                "custom palette defines {} names but {size} colors are extracted",
                names.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(Error::Config(format!("duplicate palette slot name '{dup}'")));
        }
    }

    let filled = fill(colors, size, scheme, fallback)?;
    let slots = match scheme {
        SlotScheme::Accents | SlotScheme::Custom(_) => filled
            .into_iter()
            .enumerate()
            .map(|(i, color)| (positional_name(scheme, i), color))
            .collect(),
        SlotScheme::Lightness => by_lightness(&filled),
    };

    let palette = Palette { slots };
    for (name, color) in palette.iter() {
        debug!("slot {name} = {color}");
    }
    Ok(palette)
}

fn fill(colors: &[Color], size: usize, scheme: &SlotScheme, fallback: Fallback) -> Result<Vec<Color>> {
    let missing = |index: usize| Error::InsufficientColors {
        slot: positional_name(scheme, index),
        required: size,
        available: colors.len(),
    };

    let Some(&last) = colors.last() else {
        return if size == 0 { Ok(Vec::new()) } else { Err(missing(0)) };
    };

    (0..size)
        .map(|i| match colors.get(i) {
            Some(&color) => Ok(color),
            None => match fallback {
                Fallback::ReuseLast => Ok(last),
                Fallback::Cycle => Ok(colors[i % colors.len()]),
                Fallback::None => Err(missing(i)),
            },
        })
        .collect()
}

fn by_lightness(colors: &[Color]) -> Vec<(String, Color)> {
    let Some(&first) = colors.first() else {
        return Vec::new();
    };
    if colors.len() == 1 {
        return vec![("background".to_string(), first)];
    }

    let lightness: Vec<f32> = colors.iter().map(|c| c.lightness()).collect();
    let mut bg = 0;
    let mut fg = 0;
    for (i, &l) in lightness.iter().enumerate() {
        if l < lightness[bg] {
            bg = i;
        }
        if l > lightness[fg] {
            fg = i;
        }
    }
    if fg == bg {
        fg = if bg == 0 { 1 } else { 0 };
    }

    let mut slots = vec![
        ("background".to_string(), colors[bg]),
        ("foreground".to_string(), colors[fg]),
    ];
    slots.extend(
        colors
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != bg && *i != fg)
            .enumerate()
            .map(|(n, (_, &color))| (accent(n + 1), color)),
    );
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::new(255, 0, 0);
    const GREEN: Color = Color::new(0, 255, 0);
    const BLUE: Color = Color::new(0, 0, 255);
    const BLACK: Color = Color::new(0, 0, 0);
    const WHITE: Color = Color::new(255, 255, 255);

    fn names(palette: &Palette) -> Vec<&str> {
        palette.names().collect()
    }

    #[test]
    fn accents_scheme_names_in_extraction_order() {
        let palette = build_palette(&[RED, GREEN, BLUE], 3, &SlotScheme::Accents, Fallback::None).unwrap();
        assert_eq!(names(&palette), ["primary", "accent-1", "accent-2"]);
        assert_eq!(palette.get("primary"), Some(RED));
        assert_eq!(palette.get("accent-1"), Some(GREEN));
        assert_eq!(palette.get("accent-2"), Some(BLUE));
        assert_eq!(palette.get("accent-3"), None);
    }

    #[test]
    fn building_is_deterministic() {
        let colors = [BLUE, WHITE, RED, BLACK, GREEN];
        for scheme in [SlotScheme::Accents, SlotScheme::Lightness] {
            let a = build_palette(&colors, 5, &scheme, Fallback::ReuseLast).unwrap();
            let b = build_palette(&colors, 5, &scheme, Fallback::ReuseLast).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn reuse_last_fills_missing_slots() {
        let palette = build_palette(&[RED, GREEN], 4, &SlotScheme::Accents, Fallback::ReuseLast).unwrap();
        assert_eq!(palette.len(), 4);
        assert_eq!(palette.get("accent-2"), Some(GREEN));
        assert_eq!(palette.get("accent-3"), Some(GREEN));
    }

    #[test]
    fn cycle_fills_missing_slots_from_the_start() {
        let palette = build_palette(&[RED, GREEN], 5, &SlotScheme::Accents, Fallback::Cycle).unwrap();
        let colors: Vec<Color> = palette.iter().map(|(_, c)| c).collect();
        assert_eq!(colors, [RED, GREEN, RED, GREEN, RED]);
    }

    #[test]
    fn no_fallback_reports_missing_slot() {
        let err = build_palette(&[RED, GREEN], 3, &SlotScheme::Accents, Fallback::None).unwrap_err();
        match err {
            Error::InsufficientColors {
                slot,
                required,
                available,
            } => {
                assert_eq!(slot, "accent-2");
                assert_eq!(required, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_extraction_always_fails() {
        let err = build_palette(&[], 2, &SlotScheme::Accents, Fallback::ReuseLast).unwrap_err();
        assert!(matches!(err, Error::InsufficientColors { ref slot, .. } if slot == "primary"));
    }

    #[test]
    fn lightness_scheme_picks_background_and_foreground() {
        let palette = build_palette(&[RED, WHITE, BLUE, BLACK], 4, &SlotScheme::Lightness, Fallback::None).unwrap();
        assert_eq!(names(&palette), ["background", "foreground", "accent-1", "accent-2"]);
        assert_eq!(palette.get("background"), Some(BLACK));
        assert_eq!(palette.get("foreground"), Some(WHITE));
        assert_eq!(palette.get("accent-1"), Some(RED));
        assert_eq!(palette.get("accent-2"), Some(BLUE));
    }

    #[test]
    fn lightness_scheme_with_uniform_colors_still_has_both_roles() {
        let palette = build_palette(&[RED], 2, &SlotScheme::Lightness, Fallback::ReuseLast).unwrap();
        assert_eq!(names(&palette), ["background", "foreground"]);
        assert_eq!(palette.get("foreground"), Some(RED));
    }

    #[test]
    fn lightness_scheme_single_slot() {
        let palette = build_palette(&[GREEN], 1, &SlotScheme::Lightness, Fallback::None).unwrap();
        assert_eq!(names(&palette), ["background"]);
    }

    #[test]
    fn custom_scheme_uses_given_names() {
        let scheme = SlotScheme::Custom(vec!["bg".into(), "fg".into()]);
        let palette = build_palette(&[BLACK, WHITE], 2, &scheme, Fallback::None).unwrap();
        assert_eq!(names(&palette), ["bg", "fg"]);
    }

    #[test]
    fn custom_scheme_rejects_length_mismatch_and_duplicates() {
        let short = SlotScheme::Custom(vec!["bg".into()]);
        assert!(matches!(
            build_palette(&[BLACK, WHITE], 2, &short, Fallback::None),
            Err(Error::Config(_))
        ));
        let dup = SlotScheme::Custom(vec!["bg".into(), "bg".into()]);
        assert!(matches!(
            build_palette(&[BLACK, WHITE], 2, &dup, Fallback::None),
            Err(Error::Config(_))
        ));
    }
}
