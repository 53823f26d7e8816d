use dotenvy::dotenv;
use std::env;

/// Hard cap on a single history page, matching the store-side query limit.
pub const HISTORY_PAGE_CAP: u32 = 200;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Page size used when the caller does not specify one
    pub history_page_size: u32,
    /// Default number of thread summaries returned by the thread list
    pub thread_list_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let history_page_size = env::var("MESSAGING_HISTORY_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);
        let thread_list_limit = env::var("MESSAGING_THREAD_LIST_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);

        let cfg = Self {
            database_url,
            history_page_size,
            thread_list_limit,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.history_page_size == 0 || self.history_page_size > HISTORY_PAGE_CAP {
            return Err(crate::error::AppError::Config(format!(
                "MESSAGING_HISTORY_PAGE_SIZE must be in 1..={HISTORY_PAGE_CAP}"
            )));
        }
        if self.thread_list_limit == 0 {
            return Err(crate::error::AppError::Config(
                "MESSAGING_THREAD_LIST_LIMIT must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            history_page_size: 50,
            thread_list_limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_validation() {
        assert!(Config::test_defaults().validate().is_ok());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut cfg = Config::test_defaults();
        cfg.history_page_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_page_size_is_rejected() {
        let mut cfg = Config::test_defaults();
        cfg.history_page_size = HISTORY_PAGE_CAP + 1;
        assert!(cfg.validate().is_err());
    }
}
