use crate::multiplex::PrefixStyle;
use crossterm::style::Color;

/// Colors for the task's own steps. Red is left for errors.
const STEP_COLORS: [Color; 6] = [
    Color::Green,
    Color::Blue,
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::AnsiValue(208), // orange
];

/// Muted colors for Tekton's init containers.
const INIT_COLORS: [Color; 3] = [
    Color::DarkGrey,
    Color::AnsiValue(103), // slate
    Color::AnsiValue(137), // tan
];

/// 32-bit FNV-1a; unlike `DefaultHasher` it is fixed across Rust releases.
fn fnv1a(name: &str) -> u32 {
    name.bytes().fold(0x811c_9dc5, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

/// Color for a step's prefix. The same container name always gets the same color.
pub fn step_color(container: &str, init: bool) -> Color {
    let palette: &[Color] = if init { &INIT_COLORS } else { &STEP_COLORS };
    palette[fnv1a(container) as usize % palette.len()]
}

/// Colors only make sense on a terminal, and only if the user has not opted out.
pub fn prefix_style(is_terminal: bool, no_color: bool) -> PrefixStyle {
    if is_terminal && !no_color {
        PrefixStyle::Colored
    } else {
        PrefixStyle::Plain
    }
}
