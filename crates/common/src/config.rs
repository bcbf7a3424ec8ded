use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Read `key` and parse it, falling back to `default` when unset or unparseable.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read `key` if set and non-empty.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_environment_defaults_to_development() {
        unsafe { env::remove_var("ENVIRONMENT") };
        assert_eq!(Environment::from_env(), Environment::Development);
    }

    #[test]
    #[serial]
    fn test_environment_accepts_prod_alias() {
        unsafe { env::set_var("ENVIRONMENT", "PROD") };
        assert_eq!(Environment::from_env(), Environment::Production);
        unsafe { env::remove_var("ENVIRONMENT") };
    }

    #[test]
    #[serial]
    fn test_env_or_falls_back_on_garbage() {
        unsafe { env::set_var("COMMON_TEST_NUMBER", "not-a-number") };
        assert_eq!(env_or("COMMON_TEST_NUMBER", 42u32), 42);

        unsafe { env::set_var("COMMON_TEST_NUMBER", " 7 ") };
        assert_eq!(env_or("COMMON_TEST_NUMBER", 42u32), 7);

        unsafe { env::remove_var("COMMON_TEST_NUMBER") };
        assert_eq!(env_or("COMMON_TEST_NUMBER", 42u32), 42);
    }

    #[test]
    #[serial]
    fn test_env_opt_ignores_blank_values() {
        unsafe { env::set_var("COMMON_TEST_OPT", "   ") };
        assert_eq!(env_opt("COMMON_TEST_OPT"), None);

        unsafe { env::set_var("COMMON_TEST_OPT", "labels.txt") };
        assert_eq!(env_opt("COMMON_TEST_OPT").as_deref(), Some("labels.txt"));

        unsafe { env::remove_var("COMMON_TEST_OPT") };
    }
}
