use anstyle::{AnsiColor, Color, Style};

pub const COLOR_ENV: &str = "METAL_KARMA_COLOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Auto,
    Always,
    Never,
}

impl OutputMode {
    pub fn from_env() -> Self {
        match std::env::var(COLOR_ENV).ok().as_deref() {
            Some("always") => OutputMode::Always,
            Some("never") => OutputMode::Never,
            _ => OutputMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub accent: Style,
    pub muted: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub label: Style,
    pub value: Style,
}

impl Default for Theme {
    fn default() -> Self {
        let fg = |color: AnsiColor| Style::new().fg_color(Some(Color::Ansi(color)));
        Self {
            accent: fg(AnsiColor::Magenta).bold(),
            muted: fg(AnsiColor::BrightBlack),
            success: fg(AnsiColor::Green).bold(),
            warning: fg(AnsiColor::Yellow).bold(),
            error: fg(AnsiColor::Red).bold(),
            label: fg(AnsiColor::Cyan),
            value: fg(AnsiColor::White),
        }
    }
}

pub fn resolve_color_enabled(mode: OutputMode, is_tty: bool) -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    match mode {
        OutputMode::Always => true,
        OutputMode::Never => false,
        OutputMode::Auto => is_tty,
    }
}

pub fn is_ci_environment() -> bool {
    std::env::var_os("CI").is_some()
}
