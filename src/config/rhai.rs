use serde::Deserialize;

/// Resource limits for functions installed with `add_function`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RhaiConfig {
    /// Operations one call may perform before it is aborted.
    pub max_operations: u64,
    /// Depth of nested function calls.
    pub max_call_levels: usize,
    /// Longest string, in characters.
    pub max_string_size: usize,
    /// Largest array or object map.
    pub max_array_size: usize,
}

impl Default for RhaiConfig {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_levels: 10,
            max_string_size: 8_192,
            max_array_size: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "
            max_operations: 5000
            max_array_size: 64
        ";
        let config: RhaiConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.max_operations, 5_000);
        assert_eq!(config.max_array_size, 64);
        assert_eq!(config.max_call_levels, 10);
        assert_eq!(config.max_string_size, 8_192);
    }
}
