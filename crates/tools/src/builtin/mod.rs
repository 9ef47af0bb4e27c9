//! Portable built-in tools.

pub mod calculator;
pub mod current_time;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;
