//! Operator commands that talk to the database directly.

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    db::{connect_with_retry, PgStore, Store},
    storage,
    users::manager,
};

async fn store(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool = connect_with_retry(&config.database).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;
    Ok(store)
}

pub async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    store(config).await?;
    info!("migrations applied");
    Ok(())
}

pub async fn create_superuser(config: &AppConfig, email: &str, password: &str) -> anyhow::Result<()> {
    let store = store(config).await?;
    let user = manager::create_superuser(&store, email, password)
        .await
        .with_context(|| format!("creating superuser {email}"))?;
    println!("Superuser created: {} ({})", user.email, user.id);
    Ok(())
}

/// Removes the user's stored recipe images too; a failed image delete is
/// logged and does not stop the command.
pub async fn delete_user(config: &AppConfig, email: &str) -> anyhow::Result<()> {
    let store = store(config).await?;
    let email = manager::normalize_email(email);
    let Some(user) = store.find_user_by_email(&email).await? else {
        bail!("no user with email {email}");
    };

    let objects = storage::from_config(&config.storage).await?;
    for recipe in store.list_recipes(user.id).await? {
        if let Some(key) = recipe.image.as_deref() {
            if let Err(e) = objects.delete_object(key).await {
                warn!(error = %e, %key, "failed to remove recipe image");
            }
        }
    }

    store.delete_user(user.id).await?;
    info!(user_id = %user.id, "user deleted");
    println!("Deleted {email}");
    Ok(())
}
