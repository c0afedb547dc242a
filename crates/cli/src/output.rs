//! Output formatting for CLI

use clap::ValueEnum;
use serde_json::Value;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Indented JSON
    #[default]
    Pretty,
    /// Single-line JSON
    Json,
}

/// Render a JSON value
pub fn render(value: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value).unwrap_or_default(),
        OutputFormat::Json => value.to_string(),
    }
}

/// Print a JSON value to stdout
pub fn print_value(value: &Value, format: OutputFormat) {
    println!("{}", render(value, format));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_is_single_line() {
        let value = json!({ "rowCount": 1 });
        assert_eq!(render(&value, OutputFormat::Json), r#"{"rowCount":1}"#);
        assert!(render(&value, OutputFormat::Pretty).contains('\n'));
    }
}
