//! UI components for interactive prompts

pub mod theme;

pub use theme::ForgeTheme;
