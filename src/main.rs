mod config;
mod database;
mod models;
mod services;
mod utils;

use config::Settings;
use database::Firestore;
use dotenv::dotenv;
use services::{PatchOutcome, RecordPatcher, Session};
use std::process;
use utils::AppError;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("❌ {}", e);
            process::exit(e.exit_code());
        }
    };

    log::info!("🚀 Starting record patcher...");

    let session = match Session::initialize(&settings).await {
        Ok(session) => {
            log::info!("✅ Session ready for project {}", session.project_id());
            session
        }
        Err(e) => {
            log::error!("❌ Error initializing session: {}", e);
            log::error!(
                "   Please ensure '{}' is in the correct path and is a valid service-account key.",
                settings.credentials_path
            );
            process::exit(e.exit_code());
        }
    };

    let patcher = RecordPatcher::new(Firestore::new(session), &settings);

    match patcher.patch(&settings.user_email).await {
        Ok(PatchOutcome::Persisted(patched)) => {
            if patched.address_corrected {
                log::info!(
                    "✅ User '{}' updated with role '{}' and corrected address field",
                    settings.user_email,
                    settings.target_role
                );
            } else {
                log::info!(
                    "✅ User '{}' updated with role '{}'",
                    settings.user_email,
                    settings.target_role
                );
            }
            log::info!("📄 Updated user data: {}", patched.record.to_plain_json());
        }
        Ok(PatchOutcome::DryRun(patched)) => {
            log::info!("🧪 Dry run, nothing written for '{}'", settings.user_email);
            log::info!("📄 Would store: {}", patched.record.to_plain_json());
        }
        Ok(PatchOutcome::NotFound) => {
            log::warn!(
                "⚠️  User '{}' not found in collection '{}'. Please ensure the email is correct.",
                settings.user_email,
                settings.collection
            );
        }
        Err(e) => {
            log::error!("❌ Error updating user: {}", e);
            if let AppError::Write(_) = e {
                log::error!(
                    "   Please check the security rules and ensure the '{}' collection allows write operations.",
                    settings.collection
                );
            }
            process::exit(e.exit_code());
        }
    }
}
