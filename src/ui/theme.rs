//! Terminal theme
//!
//! Colors for status output and the interactive session prompts.

use console::{Color, Style};
use dialoguer::theme::Theme;
use std::fmt;

/// Color256 approximations of the palette
pub mod palette {
    pub const PRIMARY: u8 = 117;
    pub const SUCCESS: u8 = 114;
    pub const WARNING: u8 = 220;
    pub const ERROR: u8 = 210;
    pub const MUTED: u8 = 242;
}

/// Styled prompt theme for `dialoguer`
pub struct DistillTheme {
    pub prompt_style: Style,
    pub hint_style: Style,
    pub success_style: Style,
    pub error_style: Style,
    pub prompt_prefix: String,
    pub success_prefix: String,
}

impl Default for DistillTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl DistillTheme {
    pub fn new() -> Self {
        Self {
            prompt_style: Style::new().fg(Color::Color256(palette::PRIMARY)).bold(),
            hint_style: Style::new().fg(Color::Color256(palette::MUTED)),
            success_style: Style::new().fg(Color::Color256(palette::SUCCESS)),
            error_style: Style::new().fg(Color::Color256(palette::ERROR)),
            prompt_prefix: "› ".to_string(),
            success_prefix: "✓ ".to_string(),
        }
    }
}

impl Theme for DistillTheme {
    fn format_prompt(&self, f: &mut dyn fmt::Write, prompt: &str) -> fmt::Result {
        write!(f, "{}{}", self.prompt_prefix, self.prompt_style.apply_to(prompt))
    }

    fn format_error(&self, f: &mut dyn fmt::Write, err: &str) -> fmt::Result {
        write!(f, "{}", self.error_style.apply_to(err))
    }

    fn format_confirm_prompt(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        default: Option<bool>,
    ) -> fmt::Result {
        write!(f, "{}{}", self.prompt_prefix, self.prompt_style.apply_to(prompt))?;
        match default {
            Some(true) => write!(f, " {}", self.hint_style.apply_to("[Y/n]")),
            Some(false) => write!(f, " {}", self.hint_style.apply_to("[y/N]")),
            None => write!(f, " {}", self.hint_style.apply_to("[y/n]")),
        }
    }

    fn format_confirm_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        selection: Option<bool>,
    ) -> fmt::Result {
        write!(f, "{}{}", self.prompt_prefix, self.prompt_style.apply_to(prompt))?;
        match selection {
            Some(true) => write!(f, " {}", self.success_style.apply_to("Yes")),
            Some(false) => write!(f, " {}", self.error_style.apply_to("No")),
            None => Ok(()),
        }
    }

    fn format_input_prompt(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        default: Option<&str>,
    ) -> fmt::Result {
        write!(f, "{}{}", self.prompt_prefix, self.prompt_style.apply_to(prompt))?;
        if let Some(default) = default {
            write!(f, " {}", self.hint_style.apply_to(format!("[{}]", default)))?;
        }
        write!(f, ": ")
    }

    fn format_input_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        sel: &str,
    ) -> fmt::Result {
        write!(
            f,
            "{}{}: {}",
            self.success_prefix,
            self.prompt_style.apply_to(prompt),
            self.success_style.apply_to(sel)
        )
    }
}

/// Plain styles for status lines on stderr
pub fn muted() -> Style {
    Style::new().fg(Color::Color256(palette::MUTED)).for_stderr()
}

pub fn success() -> Style {
    Style::new().fg(Color::Color256(palette::SUCCESS)).for_stderr()
}

pub fn warning() -> Style {
    Style::new().fg(Color::Color256(palette::WARNING)).for_stderr()
}

pub fn heading() -> Style {
    Style::new()
        .fg(Color::Color256(palette::PRIMARY))
        .bold()
        .for_stderr()
}
