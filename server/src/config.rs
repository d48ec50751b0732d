use anyhow::{Context, Result, anyhow};
use platform_db::DatabaseSettings;
use products_hr::UpdatePolicy;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:4200";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub cors_allowed_origins: Vec<String>,
    pub update_policy: UpdatePolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let database = DatabaseSettings::from_env().context("database settings")?;

        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into()),
        );

        let update_policy = match std::env::var("EMPLOYEE_UPDATE_POLICY") {
            Ok(raw) => UpdatePolicy::parse(&raw).ok_or_else(|| {
                anyhow!("EMPLOYEE_UPDATE_POLICY must be strict or lenient, got {raw:?}")
            })?,
            Err(_) => UpdatePolicy::default(),
        };

        Ok(Self {
            database,
            cors_allowed_origins,
            update_policy,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
