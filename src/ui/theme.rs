//! Forge theme for interactive prompts
//!
//! Colors follow the design system used by the command output.

use console::Style;
use dialoguer::theme::Theme;
use std::fmt;

/// Forge branded theme for dialoguer
pub struct ForgeTheme {
    pub prompt_style: Style,
    pub hint_style: Style,
    pub success_style: Style,
    pub error_style: Style,
    pub prompt_prefix: String,
}

impl Default for ForgeTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl ForgeTheme {
    pub fn new() -> Self {
        // Color256 approximations of PRIMARY, MUTED, SUCCESS and ERROR
        Self {
            prompt_style: Style::new().fg(console::Color::Color256(117)).bold(),
            hint_style: Style::new().fg(console::Color::Color256(242)),
            success_style: Style::new().fg(console::Color::Color256(114)),
            error_style: Style::new().fg(console::Color::Color256(210)),
            prompt_prefix: "⚠ ".to_string(),
        }
    }
}

impl Theme for ForgeTheme {
    fn format_prompt(&self, f: &mut dyn fmt::Write, prompt: &str) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.prompt_style.apply_to(&self.prompt_prefix),
            self.prompt_style.apply_to(prompt)
        )
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
}
