//! Terminal presentation: theme and progress reporting

pub mod progress;
pub mod theme;

pub use progress::{LogProgress, SpinnerProgress};
pub use theme::DistillTheme;
