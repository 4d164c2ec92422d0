use crate::utils::{AppError, AppResult};
use std::env;

pub const DEFAULT_CREDENTIALS_PATH: &str = "serviceAccountKey.json";
pub const DEFAULT_COLLECTION: &str = "gwm";
pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_TARGET_ROLE: &str = "user";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub credentials_path: String,
    /// Overrides the project id from the credential file.
    pub project_id: Option<String>,
    pub database_id: String,
    pub collection: String,
    /// Document key of the record to patch (the user's email).
    pub user_email: String,
    pub target_role: String,
    pub dry_run: bool,
    pub emulator_host: Option<String>,
}

impl Settings {
    /// Reads settings from the process environment. `.env` must already be loaded.
    /// The first positional argument, when given, overrides `PATCHER_USER_EMAIL`.
    pub fn from_env() -> AppResult<Self> {
        let email_arg = env::args().nth(1);
        Self::from_lookup(|name| env::var(name).ok(), email_arg)
    }

    pub fn from_lookup<F>(lookup: F, email_arg: Option<String>) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let user_email = email_arg
            .filter(|v| !v.trim().is_empty())
            .or_else(|| non_empty("PATCHER_USER_EMAIL"))
            .ok_or_else(|| {
                AppError::Config(
                    "no record key given: pass the user email as an argument or set PATCHER_USER_EMAIL"
                        .to_string(),
                )
            })?;

        let dry_run = match non_empty("PATCHER_DRY_RUN") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::Config(format!("PATCHER_DRY_RUN must be true or false, got '{}'", raw))
            })?,
            None => false,
        };

        let emulator_host = non_empty("FIRESTORE_EMULATOR_HOST");
        let project_id = non_empty("FIRESTORE_PROJECT_ID");
        if emulator_host.is_some() && project_id.is_none() {
            return Err(AppError::Config(
                "FIRESTORE_PROJECT_ID must be set when FIRESTORE_EMULATOR_HOST is used".to_string(),
            ));
        }

        Ok(Self {
            credentials_path: non_empty("PATCHER_CREDENTIALS_PATH")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string()),
            project_id,
            database_id: non_empty("FIRESTORE_DATABASE")
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            collection: non_empty("PATCHER_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            user_email: user_email.trim().to_string(),
            target_role: non_empty("PATCHER_TARGET_ROLE")
                .unwrap_or_else(|| DEFAULT_TARGET_ROLE.to_string()),
            dry_run,
            emulator_host,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(
            lookup_from(&[("PATCHER_USER_EMAIL", "jane@example.com")]),
            None,
        )
        .unwrap();

        assert_eq!(settings.credentials_path, DEFAULT_CREDENTIALS_PATH);
        assert_eq!(settings.collection, "gwm");
        assert_eq!(settings.database_id, "(default)");
        assert_eq!(settings.target_role, "user");
        assert_eq!(settings.user_email, "jane@example.com");
        assert_eq!(settings.project_id, None);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_argument_overrides_env_email() {
        let settings = Settings::from_lookup(
            lookup_from(&[("PATCHER_USER_EMAIL", "jane@example.com")]),
            Some("bob@example.com".to_string()),
        )
        .unwrap();

        assert_eq!(settings.user_email, "bob@example.com");
    }

    #[test]
    fn test_missing_email_is_config_error() {
        let result = Settings::from_lookup(lookup_from(&[("PATCHER_USER_EMAIL", "  ")]), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(
            lookup_from(&[
                ("PATCHER_CREDENTIALS_PATH", "/etc/keys/sa.json"),
                ("PATCHER_COLLECTION", "staff"),
                ("PATCHER_TARGET_ROLE", "admin"),
                ("PATCHER_DRY_RUN", "yes"),
                ("FIRESTORE_PROJECT_ID", "demo-project"),
                ("FIRESTORE_DATABASE", "secondary"),
            ]),
            Some("jane@example.com".to_string()),
        )
        .unwrap();

        assert_eq!(settings.credentials_path, "/etc/keys/sa.json");
        assert_eq!(settings.collection, "staff");
        assert_eq!(settings.target_role, "admin");
        assert!(settings.dry_run);
        assert_eq!(settings.project_id.as_deref(), Some("demo-project"));
        assert_eq!(settings.database_id, "secondary");
    }

    #[test]
    fn test_invalid_dry_run_flag() {
        let result = Settings::from_lookup(
            lookup_from(&[("PATCHER_DRY_RUN", "maybe")]),
            Some("jane@example.com".to_string()),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_emulator_requires_project() {
        let result = Settings::from_lookup(
            lookup_from(&[("FIRESTORE_EMULATOR_HOST", "localhost:8080")]),
            Some("jane@example.com".to_string()),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
