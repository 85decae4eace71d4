use souk_config::{AppConfig, IdentityMode};
use std::time::Duration;

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("SOUK_IDENTITY_URL", "https://identity.souk.dz/");
        std::env::set_var("SOUK_IDENTITY_ANON_KEY", "anon-key");
        std::env::set_var("SOUK_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("SOUK_AUTH_TIMEOUT_MS", "1500");
        std::env::set_var("SOUK_PUBLIC_PATHS", "/login,/health");
        std::env::remove_var("SOUK_DATABASE_URL");
        std::env::remove_var("SOUK_IDENTITY_MODE");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.identity_url, "https://identity.souk.dz");
    assert_eq!(config.identity_mode, IdentityMode::Local);
    assert_eq!(config.auth_timeout, Duration::from_millis(1500));
    assert_eq!(config.auth_path, "/login");
    assert_eq!(config.public_paths, vec!["/login", "/health"]);
    assert_eq!(config.access_ttl_seconds, 3600);

    unsafe {
        std::env::set_var("SOUK_AUTH_TIMEOUT_MS", "soon");
    }
    assert!(AppConfig::from_env().is_err());

    unsafe {
        std::env::set_var("SOUK_AUTH_TIMEOUT_MS", "1500");
        std::env::remove_var("SOUK_IDENTITY_ANON_KEY");
    }
    assert!(AppConfig::from_env().is_err());
}
