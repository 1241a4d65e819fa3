//! 配置到存储参数的转换

use secrecy::ExposeSecret;
use warden_adapter_sql::{ConnectionConfig, DeleteMode, Dialect, TokenStoreOptions};
use warden_config::{DatabaseConfig, DeleteModeConfig, TokenStoreConfig};
use warden_errors::StoreResult;

pub fn connection_config(config: &DatabaseConfig) -> StoreResult<ConnectionConfig> {
    let mut conn = ConnectionConfig::new(config.url.expose_secret().as_str())
        .with_pool(config.min_connections, config.max_connections)
        .with_connect_timeout(config.connect_timeout())
        .with_max_lifetime(Some(config.max_lifetime()));

    if let Some(dialect) = &config.dialect {
        conn = conn.with_dialect(dialect.parse::<Dialect>()?);
    }
    conn.resolve_dialect()?;

    Ok(conn)
}

pub fn token_store_options(config: &TokenStoreConfig) -> TokenStoreOptions {
    let delete_mode = match config.delete_mode {
        DeleteModeConfig::Soft => DeleteMode::Soft,
        DeleteModeConfig::Hard => DeleteMode::Hard,
    };

    TokenStoreOptions::new()
        .with_gc_interval(config.gc_interval())
        .with_table_name(config.table_name.as_str())
        .with_delete_mode(delete_mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_config::AppConfig;

    #[test]
    fn test_shipped_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("default.toml", include_str!("../config/default.toml"))?;
            let config = AppConfig::load(".").map_err(|warden_config::ConfigError::Load(e)| e)?;

            let conn = connection_config(&config.database).map_err(|e| e.to_string())?;
            assert_eq!(conn.resolve_dialect().map_err(|e| e.to_string())?, Dialect::Sqlite);

            let options = token_store_options(&config.token_store);
            assert_eq!(options.table_name, "oauth2_token");
            assert_eq!(options.gc_interval, Duration::from_secs(600));
            assert_eq!(options.delete_mode, DeleteMode::Soft);
            Ok(())
        });
    }

    #[test]
    fn test_non_positive_interval_and_hard_mode() {
        let config = TokenStoreConfig {
            table_name: "tokens".to_string(),
            gc_interval_secs: -5,
            delete_mode: DeleteModeConfig::Hard,
        };

        let options = token_store_options(&config);
        assert_eq!(options.table_name, "tokens");
        assert_eq!(options.gc_interval, Duration::from_secs(600));
        assert_eq!(options.delete_mode, DeleteMode::Hard);
    }

    #[test]
    fn test_explicit_dialect_overrides_url() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "default.toml",
                r#"
                app_name = "t"
                [database]
                url = "mysql://u:p@localhost/db"
                dialect = "mariadb"
                "#,
            )?;
            let config = AppConfig::load(".").map_err(|warden_config::ConfigError::Load(e)| e)?;
            let conn = connection_config(&config.database).map_err(|e| e.to_string())?;
            assert_eq!(conn.resolve_dialect().map_err(|e| e.to_string())?, Dialect::MySql);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_dialect_is_configuration_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "default.toml",
                r#"
                app_name = "t"
                [database]
                url = "oracle://localhost"
                "#,
            )?;
            let config = AppConfig::load(".").map_err(|warden_config::ConfigError::Load(e)| e)?;
            let err = connection_config(&config.database).unwrap_err();
            assert!(err.is_configuration());
            Ok(())
        });
    }
}
