use std::io::{self, IsTerminal, Write};

use crossterm::style::{Color as TermColor, Stylize};

use crate::color::Color;
use crate::pipeline::assign::Palette;

fn to_term(c: Color) -> TermColor {
    TermColor::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}

/// Choose black or white foreground for readable text on the given background.
fn contrast_fg(c: Color) -> TermColor {
    if c.relative_luminance() > 0.4 {
        TermColor::Black
    } else {
        TermColor::White
    }
}

/// Whether stdout can show truecolor swatches.
pub fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal()
}

/// Print the palette to stdout, with swatches when the terminal allows it.
pub fn print_palette(palette: &Palette) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_palette(&mut out, palette, supports_color())?;
    out.flush()
}

/// Write one line per slot: a colored swatch labelled with the hex value and
/// the slot name, or a plain `name  #rrggbb` listing when `color` is false.
pub fn write_palette<W: Write>(out: &mut W, palette: &Palette, color: bool) -> io::Result<()> {
    writeln!(out, "Palette preview:")?;
    let width = palette.names().map(str::len).max().unwrap_or(0);
    for (name, c) in palette.iter() {
        if color {
            let swatch = "    ".on(to_term(c));
            let label = format!(" {} ", c.to_hex()).on(to_term(c)).with(contrast_fg(c));
            writeln!(out, "  {swatch}{label} {name}")?;
        } else {
            writeln!(out, "  {name:<width$}  {}", c.to_hex())?;
        }
    }
    writeln!(out)
}
