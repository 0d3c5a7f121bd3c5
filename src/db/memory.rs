use std::collections::HashSet;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    sorted_ids, NamedKind, NamedRow, NewUser, ProfileUpdate, Recipe, RecipeFields, Store,
    StoreError, User,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<NamedRow>,
    ingredients: Vec<NamedRow>,
    recipes: Vec<Recipe>,
}

impl Tables {
    fn named(&self, kind: NamedKind) -> &Vec<NamedRow> {
        match kind {
            NamedKind::Tag => &self.tags,
            NamedKind::Ingredient => &self.ingredients,
        }
    }

    fn named_mut(&mut self, kind: NamedKind) -> &mut Vec<NamedRow> {
        match kind {
            NamedKind::Tag => &mut self.tags,
            NamedKind::Ingredient => &mut self.ingredients,
        }
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn recipe_mut(&mut self, owner: Uuid, id: Uuid) -> Option<&mut Recipe> {
        self.recipes
            .iter_mut()
            .find(|r| r.id == id && r.user_id == owner)
    }
}

/// Keeps everything in process memory with the same ownership and cascade rules
/// as the PostgreSQL schema. Used by tests and local experiments.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_by_name_desc(rows: &mut [NamedRow]) {
    rows.sort_by(|a, b| b.name.cmp(&a.name));
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::Conflict("email"));
        }
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict("email"));
        }
        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        stored.email = user.email.clone();
        stored.name = user.name.clone();
        stored.password_hash = user.password_hash.clone();
        stored.is_active = user.is_active;
        stored.is_staff = user.is_staff;
        stored.is_superuser = user.is_superuser;
        Ok(stored.clone())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(email) = update.email.as_deref() {
            if tables.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("email"));
            }
        }
        let Some(stored) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = update.email {
            stored.email = email;
        }
        if let Some(name) = update.name {
            stored.name = name;
        }
        if let Some(password_hash) = update.password_hash {
            stored.password_hash = password_hash;
        }
        Ok(Some(stored.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.tags.retain(|t| t.user_id != id);
        tables.ingredients.retain(|i| i.user_id != id);
        tables.recipes.retain(|r| r.user_id != id);

        let tag_ids: HashSet<Uuid> = tables.tags.iter().map(|t| t.id).collect();
        let ingredient_ids: HashSet<Uuid> = tables.ingredients.iter().map(|i| i.id).collect();
        for recipe in &mut tables.recipes {
            recipe.tag_ids.retain(|id| tag_ids.contains(id));
            recipe.ingredient_ids.retain(|id| ingredient_ids.contains(id));
        }
        Ok(true)
    }

    async fn list_named(&self, kind: NamedKind, owner: Uuid) -> Result<Vec<NamedRow>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<NamedRow> = tables
            .named(kind)
            .iter()
            .filter(|row| row.user_id == owner)
            .cloned()
            .collect();
        sort_by_name_desc(&mut rows);
        Ok(rows)
    }

    async fn insert_named(
        &self,
        kind: NamedKind,
        owner: Uuid,
        name: &str,
    ) -> Result<NamedRow, StoreError> {
        let mut tables = self.tables.write().await;
        let row = NamedRow {
            id: Uuid::new_v4(),
            user_id: owner,
            name: name.to_string(),
        };
        tables.named_mut(kind).push(row.clone());
        Ok(row)
    }

    async fn find_named(
        &self,
        kind: NamedKind,
        owner: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<NamedRow>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<NamedRow> = tables
            .named(kind)
            .iter()
            .filter(|row| row.user_id == owner && ids.contains(&row.id))
            .cloned()
            .collect();
        sort_by_name_desc(&mut rows);
        Ok(rows)
    }

    async fn list_recipes(&self, owner: Uuid) -> Result<Vec<Recipe>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find_recipe(&self, owner: Uuid, id: Uuid) -> Result<Option<Recipe>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .find(|r| r.id == id && r.user_id == owner)
            .cloned())
    }

    async fn insert_recipe(&self, owner: Uuid, fields: RecipeFields) -> Result<Recipe, StoreError> {
        let mut tables = self.tables.write().await;
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id: owner,
            title: fields.title,
            time_minutes: fields.time_minutes,
            price: fields.price,
            link: fields.link,
            image: None,
            tag_ids: sorted_ids(&fields.tag_ids),
            ingredient_ids: sorted_ids(&fields.ingredient_ids),
        };
        tables.recipes.push(recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: RecipeFields,
    ) -> Result<Option<Recipe>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(recipe) = tables.recipe_mut(owner, id) else {
            return Ok(None);
        };
        recipe.title = fields.title;
        recipe.time_minutes = fields.time_minutes;
        recipe.price = fields.price;
        recipe.link = fields.link;
        recipe.tag_ids = sorted_ids(&fields.tag_ids);
        recipe.ingredient_ids = sorted_ids(&fields.ingredient_ids);
        Ok(Some(recipe.clone()))
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: Uuid,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(recipe) = tables.recipe_mut(owner, id) else {
            return Ok(None);
        };
        recipe.image = image.map(str::to_string);
        Ok(Some(recipe.clone()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Cook".into(),
            password_hash: "hash".into(),
            ..NewUser::default()
        }
    }

    fn fields(title: &str) -> RecipeFields {
        RecipeFields {
            title: title.into(),
            time_minutes: 30,
            price: Decimal::new(500, 2),
            link: None,
            tag_ids: Vec::new(),
            ingredient_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.insert_user(new_user("a@example.com")).await.unwrap();
        let err = store
            .insert_user(new_user("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict("email")));
    }

    #[tokio::test]
    async fn named_rows_are_scoped_and_sorted_desc() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice@example.com")).await.unwrap();
        let bob = store.insert_user(new_user("bob@example.com")).await.unwrap();

        store.insert_named(NamedKind::Tag, alice.id, "Breakfast").await.unwrap();
        store.insert_named(NamedKind::Tag, alice.id, "Vegan").await.unwrap();
        let foreign = store.insert_named(NamedKind::Tag, bob.id, "Dessert").await.unwrap();
        store
            .insert_named(NamedKind::Ingredient, alice.id, "Salt")
            .await
            .unwrap();

        let tags = store.list_named(NamedKind::Tag, alice.id).await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Vegan", "Breakfast"]);

        let found = store
            .find_named(NamedKind::Tag, alice.id, &[foreign.id])
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn foreign_recipe_looks_missing() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice@example.com")).await.unwrap();
        let bob = store.insert_user(new_user("bob@example.com")).await.unwrap();
        let recipe = store.insert_recipe(alice.id, fields("Soup")).await.unwrap();

        assert!(store.find_recipe(bob.id, recipe.id).await.unwrap().is_none());
        assert!(store
            .update_recipe(bob.id, recipe.id, fields("Stolen"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .set_recipe_image(bob.id, recipe.id, Some("uploads/recipe/x.png"))
            .await
            .unwrap()
            .is_none());

        let kept = store.find_recipe(alice.id, recipe.id).await.unwrap().unwrap();
        assert_eq!(kept.title, "Soup");
        assert_eq!(kept.image, None);
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice@example.com")).await.unwrap();
        let bob = store.insert_user(new_user("bob@example.com")).await.unwrap();
        let tag = store.insert_named(NamedKind::Tag, alice.id, "Quick").await.unwrap();
        let mut with_tag = fields("Toast");
        with_tag.tag_ids = vec![tag.id];
        store.insert_recipe(alice.id, with_tag).await.unwrap();
        store.insert_recipe(bob.id, fields("Stew")).await.unwrap();

        assert!(store.delete_user(alice.id).await.unwrap());
        assert!(!store.delete_user(alice.id).await.unwrap());

        assert!(store.find_user(alice.id).await.unwrap().is_none());
        assert!(store.list_named(NamedKind::Tag, alice.id).await.unwrap().is_empty());
        assert!(store.list_recipes(alice.id).await.unwrap().is_empty());
        assert_eq!(store.list_recipes(bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recipe_relations_are_deduplicated() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice@example.com")).await.unwrap();
        let tag = store.insert_named(NamedKind::Tag, alice.id, "Quick").await.unwrap();
        let mut f = fields("Toast");
        f.tag_ids = vec![tag.id, tag.id];
        let recipe = store.insert_recipe(alice.id, f).await.unwrap();
        assert_eq!(recipe.tag_ids, vec![tag.id]);
    }

    #[tokio::test]
    async fn relation_ids_keep_one_order_across_writes_and_reads() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice@example.com")).await.unwrap();
        let mut tags = Vec::new();
        for name in ["Quick", "Cheap", "Vegan"] {
            tags.push(store.insert_named(NamedKind::Tag, alice.id, name).await.unwrap().id);
        }
        let mut ascending = tags.clone();
        ascending.sort();
        let mut descending = ascending.clone();
        descending.reverse();

        let mut f = fields("Toast");
        f.tag_ids = descending.clone();
        let created = store.insert_recipe(alice.id, f.clone()).await.unwrap();
        assert_eq!(created.tag_ids, ascending);

        let updated = store
            .update_recipe(alice.id, created.id, f)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.tag_ids, ascending);

        let read = store.find_recipe(alice.id, created.id).await.unwrap().unwrap();
        assert_eq!(read.tag_ids, ascending);
    }

    #[tokio::test]
    async fn profile_update_touches_only_profile_columns() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice@example.com")).await.unwrap();
        store.insert_user(new_user("bob@example.com")).await.unwrap();

        // an admin promotes alice after her request loaded the old row
        let mut promoted = alice.clone();
        promoted.is_staff = true;
        promoted.is_active = false;
        store.update_user(&promoted).await.unwrap();

        let update = ProfileUpdate {
            name: Some("Alice".into()),
            ..ProfileUpdate::default()
        };
        let user = store.update_profile(alice.id, update).await.unwrap().unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_staff);
        assert!(!user.is_active);

        let taken = ProfileUpdate {
            email: Some("bob@example.com".into()),
            ..ProfileUpdate::default()
        };
        let err = store.update_profile(alice.id, taken).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict("email")));

        let gone = store
            .update_profile(Uuid::new_v4(), ProfileUpdate::default())
            .await
            .unwrap();
        assert!(gone.is_none());
    }
}
