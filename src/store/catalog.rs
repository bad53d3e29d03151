use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};
use tracing::info;
use validator::Validate;

use super::{CatalogStore, not_found};
use crate::{
    entities::{category, crew_member, genre, movie, movie_actor, movie_director, movie_genre},
    error::AppResult,
    models::{CategoryInput, CrewMemberInput, GenreInput},
};

impl CatalogStore {
    pub async fn list_categories(&self) -> AppResult<Vec<category::Model>> {
        Ok(category::Entity::find().order_by_asc(category::Column::Id).all(&self.db).await?)
    }

    pub async fn get_category(&self, id: i32) -> AppResult<category::Model> {
        category::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found("category", id))
    }

    pub async fn create_category(&self, input: CategoryInput) -> AppResult<category::Model> {
        input.validate()?;
        let model = category::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            url: Set(input.url),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(id = model.id, url = %model.url, "category created");
        Ok(model)
    }

    pub async fn update_category(
        &self,
        id: i32,
        input: CategoryInput,
    ) -> AppResult<category::Model> {
        input.validate()?;
        let mut active = self.get_category(id).await?.into_active_model();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.url = Set(input.url);
        Ok(active.update(&self.db).await?)
    }

    /// Movies in the category stay, with their category cleared.
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        let txn = self.db.begin().await?;

        let cleared = movie::Entity::update_many()
            .col_expr(movie::Column::CategoryId, Expr::value(Option::<i32>::None))
            .filter(movie::Column::CategoryId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        let deleted = category::Entity::delete_by_id(id).exec(&txn).await?.rows_affected;
        if deleted == 0 {
            return Err(not_found("category", id));
        }

        txn.commit().await?;
        info!(id, movies_cleared = cleared, "category deleted");
        Ok(())
    }

    pub async fn list_genres(&self) -> AppResult<Vec<genre::Model>> {
        Ok(genre::Entity::find().order_by_asc(genre::Column::Name).all(&self.db).await?)
    }

    pub async fn get_genre(&self, id: i32) -> AppResult<genre::Model> {
        genre::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| not_found("genre", id))
    }

    pub async fn create_genre(&self, input: GenreInput) -> AppResult<genre::Model> {
        input.validate()?;
        let model = genre::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            url: Set(input.url),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(id = model.id, url = %model.url, "genre created");
        Ok(model)
    }

    pub async fn update_genre(&self, id: i32, input: GenreInput) -> AppResult<genre::Model> {
        input.validate()?;
        let mut active = self.get_genre(id).await?.into_active_model();
        active.name = Set(input.name);
        active.description = Set(input.description);
        active.url = Set(input.url);
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_genre(&self, id: i32) -> AppResult<()> {
        let txn = self.db.begin().await?;

        movie_genre::Entity::delete_many()
            .filter(movie_genre::Column::GenreId.eq(id))
            .exec(&txn)
            .await?;

        let deleted = genre::Entity::delete_by_id(id).exec(&txn).await?.rows_affected;
        if deleted == 0 {
            return Err(not_found("genre", id));
        }

        txn.commit().await?;
        info!(id, "genre deleted");
        Ok(())
    }

    pub async fn list_crew(&self) -> AppResult<Vec<crew_member::Model>> {
        Ok(crew_member::Entity::find().order_by_asc(crew_member::Column::Id).all(&self.db).await?)
    }

    pub async fn get_crew_member(&self, id: i32) -> AppResult<crew_member::Model> {
        crew_member::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found("crew member", id))
    }

    pub async fn create_crew_member(
        &self,
        input: CrewMemberInput,
    ) -> AppResult<crew_member::Model> {
        input.validate()?;
        let model = crew_member::ActiveModel {
            name: Set(input.name),
            age: Set(input.age),
            description: Set(input.description),
            image: Set(input.image),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(id = model.id, name = %model.name, "crew member created");
        Ok(model)
    }

    pub async fn update_crew_member(
        &self,
        id: i32,
        input: CrewMemberInput,
    ) -> AppResult<crew_member::Model> {
        input.validate()?;
        let mut active = self.get_crew_member(id).await?.into_active_model();
        active.name = Set(input.name);
        active.age = Set(input.age);
        active.description = Set(input.description);
        active.image = Set(input.image);
        Ok(active.update(&self.db).await?)
    }

    /// Removes the member from every cast and director list, then the row.
    pub async fn delete_crew_member(&self, id: i32) -> AppResult<()> {
        let txn = self.db.begin().await?;

        movie_director::Entity::delete_many()
            .filter(movie_director::Column::CrewMemberId.eq(id))
            .exec(&txn)
            .await?;
        movie_actor::Entity::delete_many()
            .filter(movie_actor::Column::CrewMemberId.eq(id))
            .exec(&txn)
            .await?;

        let deleted = crew_member::Entity::delete_by_id(id).exec(&txn).await?.rows_affected;
        if deleted == 0 {
            return Err(not_found("crew member", id));
        }

        txn.commit().await?;
        info!(id, "crew member deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, store::fixtures};

    #[tokio::test]
    async fn duplicate_category_slug_is_a_conflict() {
        let store = fixtures::store().await;
        fixtures::category(&store, "Drama", "drama").await;

        let err = store
            .create_category(CategoryInput {
                name: "Drama again".into(),
                description: String::new(),
                url: "drama".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_slug_is_rejected() {
        let store = fixtures::store().await;
        let err = store
            .create_genre(GenreInput {
                name: "Sci-Fi".into(),
                description: String::new(),
                url: "sci fi".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn deleting_category_clears_movie_reference() {
        let store = fixtures::store().await;
        let drama = fixtures::category(&store, "Drama", "drama").await;

        let mut input = fixtures::movie_input("Test", "test-1", 2010);
        input.category_id = Some(drama.id);
        let movie = store.create_movie(input).await.unwrap().movie;
        assert_eq!(movie.category_id, Some(drama.id));

        store.delete_category(drama.id).await.unwrap();

        let movie = store.get_movie(movie.id).await.unwrap().movie;
        assert_eq!(movie.category_id, None);
        assert!(matches!(store.get_category(drama.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_genre_unlinks_movies() {
        let store = fixtures::store().await;
        let western = fixtures::genre(&store, "Western").await;

        let mut input = fixtures::movie_input("Rio Bravo", "rio-bravo", 1959);
        input.genres = vec![western.id];
        let movie = store.create_movie(input).await.unwrap().movie;

        store.delete_genre(western.id).await.unwrap();

        let record = store.get_movie(movie.id).await.unwrap();
        assert!(record.genres.is_empty());
    }

    #[tokio::test]
    async fn crew_member_update_and_delete() {
        let store = fixtures::store().await;
        let member = store
            .create_crew_member(CrewMemberInput {
                name: "Keanu Reeves".into(),
                age: 58,
                description: String::new(),
                image: "crew/keanu.jpg".into(),
            })
            .await
            .unwrap();

        let updated = store
            .update_crew_member(
                member.id,
                CrewMemberInput {
                    name: "Keanu Reeves".into(),
                    age: 59,
                    description: "Actor".into(),
                    image: "crew/keanu.jpg".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.age, 59);

        store.delete_crew_member(member.id).await.unwrap();
        assert!(matches!(store.delete_crew_member(member.id).await, Err(AppError::NotFound(_))));
    }
}
