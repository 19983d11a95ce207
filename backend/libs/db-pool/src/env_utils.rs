//! Environment variable parsing utilities

use std::str::FromStr;

/// Parse an environment variable with a default fallback.
///
/// Missing and unparsable values both yield `default`.
///
/// # Example
/// ```ignore
/// let port: u16 = parse_env_with_default("PORT", 8080);
/// ```
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_parse_env_with_default() {
        let result: u32 = parse_env_with_default("NONEXISTENT_VAR_XYZ", 42);
        assert_eq!(result, 42);

        std::env::set_var("TEST_PORT", " 8080 ");
        let result: u16 = parse_env_with_default("TEST_PORT", 3000);
        assert_eq!(result, 8080);

        std::env::set_var("TEST_PORT", "eighty");
        let result: u16 = parse_env_with_default("TEST_PORT", 3000);
        assert_eq!(result, 3000);
        std::env::remove_var("TEST_PORT");
    }
}
