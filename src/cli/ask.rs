//! Ask command - answer a question with the closest indexed files as context

use anyhow::{Context, Result};
use std::io::{self, Write};

use crate::ai::{save_response, Answer, ContextAssembler, OpenAiClient};
use crate::config::Config;
use crate::retrieval::SelectionPolicy;
use crate::store::VectorStore;

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";      // #64B5F6
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m";      // #A5D6A7
    pub const AI_ACCENT: &str = "\x1b[38;2;255;202;40m";     // #FFCA28
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";         // #546E7A
    pub const FG: &str = "\x1b[38;2;212;212;215m";           // #D4D4D7
}

mod symbols {
    pub const AI_ICON: &str = "󰌤";
    pub const SEARCH: &str = "󰍉";
    pub const SUCCESS: &str = "󰄂";
    pub const WARNING: &str = "⚠";
    pub const FILE: &str = "󰈙";
    pub const SPINNER: &str = "⠋";
}

/// Per-call overrides of the configured selection policy
#[derive(Debug, Default, Clone, Copy)]
pub struct AskOptions {
    pub top_n: Option<usize>,
    pub threshold: Option<f32>,
    pub fallback_threshold: Option<f32>,
    pub no_save: bool,
}

impl AskOptions {
    pub fn apply(&self, base: SelectionPolicy) -> SelectionPolicy {
        SelectionPolicy {
            initial_threshold: self.threshold.unwrap_or(base.initial_threshold),
            fallback_threshold: self.fallback_threshold.unwrap_or(base.fallback_threshold),
            top_n: self.top_n.unwrap_or(base.top_n),
        }
    }
}

pub async fn run(config: Config, question: &str, options: AskOptions) -> Result<()> {
    print_header(question);

    let client = OpenAiClient::from_config(&config.ai)?;

    if !config.general.database.exists() {
        print_warning("No embeddings found. Run `forge index` first for project context.");
    }
    let store = VectorStore::open(&config.general.database).with_context(|| {
        format!("Failed to open embedding store {}", config.general.database.display())
    })?;

    let policy = options.apply(config.retrieval);
    let assembler = ContextAssembler::new(client.clone(), client, policy, &config.ai.system_prompt);

    print_thinking();
    let answer = assembler.answer(&store, question).await;
    clear_line();
    let answer = answer?;

    print_sources(&answer);
    print_response(&answer.response);

    if !options.no_save {
        let path = save_response(&config.general.responses_dir, &answer, chrono::Local::now())?;
        println!(
            "{}  {} Saved to {}{}",
            colors::SUCCESS, symbols::SUCCESS, path.display(), colors::RESET
        );
    }

    Ok(())
}

/// Print the header
fn print_header(question: &str) {
    println!();
    println!(
        "{}{}  {} Asking about your codebase...{}",
        colors::PRIMARY, colors::BOLD, symbols::SEARCH, colors::RESET
    );
    println!(
        "{}  │ {}{}{}",
        colors::MUTED, colors::FG, question, colors::RESET
    );
    println!(
        "{}  ╰{}─{}",
        colors::MUTED, "─".repeat(50), colors::RESET
    );
    println!();
}

/// Print which files were used as context
fn print_sources(answer: &Answer) {
    if answer.shortlist.is_empty() {
        print_warning("No indexed files matched; answered without project context.");
        return;
    }

    println!(
        "{}  Context ({}):{}",
        colors::MUTED, answer.shortlist.tier.describe(), colors::RESET
    );
    for candidate in &answer.shortlist.candidates {
        println!(
            "{}    {} {}{} {}{:.3}{}",
            colors::FG, symbols::FILE, candidate.file_path, colors::RESET,
            colors::MUTED, candidate.score, colors::RESET
        );
    }
}

/// Print thinking indicator
fn print_thinking() {
    print!(
        "\r{}  {} Thinking {}{}",
        colors::AI_ACCENT, symbols::AI_ICON, symbols::SPINNER, colors::RESET
    );
    io::stdout().flush().ok();
}

/// Clear the current line
fn clear_line() {
    print!("\r{}\r", " ".repeat(60));
    io::stdout().flush().ok();
}

/// Print the AI response
fn print_response(response: &str) {
    println!();
    println!(
        "{}{}  {} Answer {}",
        colors::AI_ACCENT, colors::BOLD, symbols::AI_ICON, colors::RESET
    );
    println!(
        "{}  ╭{}─{}",
        colors::MUTED, "─".repeat(50), colors::RESET
    );

    for line in response.lines() {
        println!("{}  │ {}{}", colors::MUTED, colors::FG, line);
    }

    println!(
        "{}  ╰{}─{}",
        colors::MUTED, "─".repeat(50), colors::RESET
    );
    println!();
}

/// Print warning message
fn print_warning(message: &str) {
    println!(
        "{}  {} {}{}",
        colors::AI_ACCENT, symbols::WARNING, message, colors::RESET
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_override_policy() {
        let base = SelectionPolicy::default();
        assert_eq!(AskOptions::default().apply(base), base);

        let options = AskOptions {
            top_n: Some(5),
            threshold: Some(0.7),
            ..AskOptions::default()
        };
        let policy = options.apply(base);
        assert_eq!(policy.top_n, 5);
        assert_eq!(policy.initial_threshold, 0.7);
        assert_eq!(policy.fallback_threshold, 0.3);
    }
}
