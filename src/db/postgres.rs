use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    sorted_ids, NamedKind, NamedRow, NewUser, ProfileUpdate, Recipe, RecipeFields, Store,
    StoreError, User,
};
use crate::config::DatabaseConfig;

const USER_COLUMNS: &str =
    "id, email, name, password_hash, is_active, is_staff, is_superuser, created_at";
const RECIPE_COLUMNS: &str = "id, user_id, title, time_minutes, price, link, image";
const NAMED_COLUMNS: &str = "id, user_id, name";

/// Connects to PostgreSQL, retrying while the server is still coming up.
pub async fn connect_with_retry(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let mut attempt = 1;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
        {
            Ok(pool) => {
                info!(attempt, "database available");
                return Ok(pool);
            }
            Err(e) if attempt < config.connect_retries => {
                warn!(error = %e, attempt, "database unavailable, retrying");
                tokio::time::sleep(config.retry_delay()).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("connect to database after {attempt} attempts")
                })
            }
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn attach_relations(&self, recipes: &mut [Recipe]) -> Result<(), StoreError> {
        if recipes.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();

        let tag_links = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT recipe_id, tag_id
            FROM recipe_tags
            WHERE recipe_id = ANY($1)
            ORDER BY tag_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let ingredient_links = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT recipe_id, ingredient_id
            FROM recipe_ingredients
            WHERE recipe_id = ANY($1)
            ORDER BY ingredient_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut tags: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (recipe_id, tag_id) in tag_links {
            tags.entry(recipe_id).or_default().push(tag_id);
        }
        let mut ingredients: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (recipe_id, ingredient_id) in ingredient_links {
            ingredients.entry(recipe_id).or_default().push(ingredient_id);
        }

        for recipe in recipes.iter_mut() {
            recipe.tag_ids = tags.remove(&recipe.id).unwrap_or_default();
            recipe.ingredient_ids = ingredients.remove(&recipe.id).unwrap_or_default();
        }
        Ok(())
    }
}

fn unique_on(column: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(column),
        _ => StoreError::Database(e),
    }
}

async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    fields: &RecipeFields,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    if !fields.tag_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO recipe_tags (recipe_id, tag_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(recipe_id)
        .bind(&fields.tag_ids)
        .execute(&mut **tx)
        .await?;
    }
    if !fields.ingredient_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(recipe_id)
        .bind(&fields.ingredient_ids)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, name, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .fetch_one(&self.db)
            .await
            .map_err(unique_on("email"))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = $2, name = $3, password_hash = $4,
                is_active = $5, is_staff = $6, is_superuser = $7
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .fetch_one(&self.db)
            .await
            .map_err(unique_on("email"))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                password_hash = COALESCE($4, password_hash)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&update.email)
            .bind(&update.name)
            .bind(&update.password_hash)
            .fetch_optional(&self.db)
            .await
            .map_err(unique_on("email"))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_named(&self, kind: NamedKind, owner: Uuid) -> Result<Vec<NamedRow>, StoreError> {
        let sql = format!(
            "SELECT {NAMED_COLUMNS} FROM {} WHERE user_id = $1 ORDER BY name DESC",
            kind.table()
        );
        Ok(sqlx::query_as::<_, NamedRow>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?)
    }

    async fn insert_named(
        &self,
        kind: NamedKind,
        owner: Uuid,
        name: &str,
    ) -> Result<NamedRow, StoreError> {
        let sql = format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING {NAMED_COLUMNS}",
            kind.table()
        );
        Ok(sqlx::query_as::<_, NamedRow>(&sql)
            .bind(owner)
            .bind(name)
            .fetch_one(&self.db)
            .await?)
    }

    async fn find_named(
        &self,
        kind: NamedKind,
        owner: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<NamedRow>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {NAMED_COLUMNS}
            FROM {}
            WHERE user_id = $1 AND id = ANY($2)
            ORDER BY name DESC
            "#,
            kind.table()
        );
        Ok(sqlx::query_as::<_, NamedRow>(&sql)
            .bind(owner)
            .bind(ids)
            .fetch_all(&self.db)
            .await?)
    }

    async fn list_recipes(&self, owner: Uuid) -> Result<Vec<Recipe>, StoreError> {
        let sql = format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY created_at, id"
        );
        let mut recipes = sqlx::query_as::<_, Recipe>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?;
        self.attach_relations(&mut recipes).await?;
        Ok(recipes)
    }

    async fn find_recipe(&self, owner: Uuid, id: Uuid) -> Result<Option<Recipe>, StoreError> {
        let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2");
        let Some(recipe) = sqlx::query_as::<_, Recipe>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let mut one = [recipe];
        self.attach_relations(&mut one).await?;
        let [recipe] = one;
        Ok(Some(recipe))
    }

    async fn insert_recipe(&self, owner: Uuid, fields: RecipeFields) -> Result<Recipe, StoreError> {
        let mut tx = self.db.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RECIPE_COLUMNS}
            "#
        );
        let mut recipe = sqlx::query_as::<_, Recipe>(&sql)
            .bind(owner)
            .bind(&fields.title)
            .bind(fields.time_minutes)
            .bind(fields.price)
            .bind(&fields.link)
            .fetch_one(&mut *tx)
            .await?;
        replace_links(&mut tx, recipe.id, &fields).await?;
        tx.commit().await?;

        recipe.tag_ids = sorted_ids(&fields.tag_ids);
        recipe.ingredient_ids = sorted_ids(&fields.ingredient_ids);
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: RecipeFields,
    ) -> Result<Option<Recipe>, StoreError> {
        let mut tx = self.db.begin().await?;
        let sql = format!(
            r#"
            UPDATE recipes
            SET title = $3, time_minutes = $4, price = $5, link = $6
            WHERE id = $1 AND user_id = $2
            RETURNING {RECIPE_COLUMNS}
            "#
        );
        let Some(mut recipe) = sqlx::query_as::<_, Recipe>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&fields.title)
            .bind(fields.time_minutes)
            .bind(fields.price)
            .bind(&fields.link)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        replace_links(&mut tx, recipe.id, &fields).await?;
        tx.commit().await?;

        recipe.tag_ids = sorted_ids(&fields.tag_ids);
        recipe.ingredient_ids = sorted_ids(&fields.ingredient_ids);
        Ok(Some(recipe))
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: Uuid,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, StoreError> {
        let sql = format!(
            "UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
        );
        let Some(recipe) = sqlx::query_as::<_, Recipe>(&sql)
            .bind(id)
            .bind(owner)
            .bind(image)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let mut one = [recipe];
        self.attach_relations(&mut one).await?;
        let [recipe] = one;
        Ok(Some(recipe))
    }
}
