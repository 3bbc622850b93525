use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 1,
            thread_name_prefix: "sluice-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency must be > 0"));
        }
        if self.concurrency > 1024 {
            return Err(Error::config("concurrency too large (max 1024)"));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(Config::default().validate().is_ok());
        assert_eq!(Config::default().concurrency, 1);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Config::builder().concurrency(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_concurrency_rejected() {
        let result = Config::builder().concurrency(4096).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .concurrency(4)
            .thread_name_prefix("test-worker")
            .stack_size(1024 * 1024)
            .build()
            .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.thread_name_prefix, "test-worker");
        assert_eq!(config.stack_size, Some(1024 * 1024));
    }
}
