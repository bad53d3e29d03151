use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Select,
    Set, TransactionTrait, sea_query::Expr,
};
use tracing::info;
use validator::Validate;

use super::{CatalogStore, missing_reference, not_found};
use crate::{
    entities::{movie, movie_still, rating, review},
    error::{AppError, AppResult},
    models::{MovieStillInput, REVIEW_TEXT_MAX, Rate, ReviewForm, ReviewText},
};

impl CatalogStore {
    pub async fn list_stills(&self, movie_id: Option<i32>) -> AppResult<Vec<movie_still::Model>> {
        let query = for_movie(movie_still::Entity::find(), movie_still::Column::MovieId, movie_id);
        Ok(query.order_by_asc(movie_still::Column::Id).all(&self.db).await?)
    }

    pub async fn get_still(&self, id: i32) -> AppResult<movie_still::Model> {
        movie_still::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found("movie still", id))
    }

    pub async fn create_still(&self, input: MovieStillInput) -> AppResult<movie_still::Model> {
        input.validate()?;
        self.require_movie(input.movie_id).await?;
        let model = movie_still::ActiveModel {
            title: Set(input.title),
            description: Set(input.description),
            image: Set(input.image),
            movie_id: Set(input.movie_id),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(id = model.id, movie_id = model.movie_id, "movie still created");
        Ok(model)
    }

    pub async fn update_still(
        &self,
        id: i32,
        input: MovieStillInput,
    ) -> AppResult<movie_still::Model> {
        input.validate()?;
        let mut active = self.get_still(id).await?.into_active_model();
        self.require_movie(input.movie_id).await?;
        active.title = Set(input.title);
        active.description = Set(input.description);
        active.image = Set(input.image);
        active.movie_id = Set(input.movie_id);
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_still(&self, id: i32) -> AppResult<()> {
        let deleted = movie_still::Entity::delete_by_id(id).exec(&self.db).await?.rows_affected;
        if deleted == 0 {
            return Err(not_found("movie still", id));
        }
        Ok(())
    }

    pub async fn list_reviews(&self, movie_id: Option<i32>) -> AppResult<Vec<review::Model>> {
        let query = for_movie(review::Entity::find(), review::Column::MovieId, movie_id);
        Ok(query.order_by_asc(review::Column::Id).all(&self.db).await?)
    }

    pub async fn get_review(&self, id: i32) -> AppResult<review::Model> {
        review::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| not_found("review", id))
    }

    /// Stores a validated review. The parent may belong to any movie but must
    /// be a top-level review: threads are one reply deep.
    pub async fn create_review(&self, movie_id: i32, form: &ReviewForm) -> AppResult<review::Model> {
        form.validate()?;
        self.require_movie(movie_id).await?;
        if let Some(parent_id) = form.parent {
            let parent = review::Entity::find_by_id(parent_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| missing_reference("review", parent_id))?;
            if parent.parent_id.is_some() || parent.detached {
                return Err(AppError::Validation(format!(
                    "review {parent_id} is itself a reply and cannot be answered"
                )));
            }
        }

        let model = review::ActiveModel {
            email: Set(form.email.clone()),
            name: Set(form.name.clone()),
            text: Set(form.text.clone()),
            parent_id: Set(form.parent),
            detached: Set(false),
            movie_id: Set(movie_id),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(id = model.id, movie_id, parent_id = ?model.parent_id, "review created");
        Ok(model)
    }

    /// Name and email are fixed once submitted; only the text can be moderated.
    pub async fn update_review_text(&self, id: i32, input: ReviewText) -> AppResult<review::Model> {
        input.validate()?;
        let mut active = self.get_review(id).await?.into_active_model();
        active.text = Set(input.text);
        Ok(active.update(&self.db).await?)
    }

    /// Deletes a review. Its replies lose their parent and are marked detached,
    /// so they never turn into top-level reviews.
    pub async fn delete_review(&self, id: i32) -> AppResult<()> {
        let txn = self.db.begin().await?;

        let detached = review::Entity::update_many()
            .col_expr(review::Column::ParentId, Expr::value(Option::<i32>::None))
            .col_expr(review::Column::Detached, Expr::value(true))
            .filter(review::Column::ParentId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        let deleted = review::Entity::delete_by_id(id).exec(&txn).await?.rows_affected;
        if deleted == 0 {
            return Err(not_found("review", id));
        }

        txn.commit().await?;
        info!(id, detached, "review deleted");
        Ok(())
    }

    pub async fn list_ratings(&self, movie_id: Option<i32>) -> AppResult<Vec<rating::Model>> {
        let query = for_movie(rating::Entity::find(), rating::Column::MovieId, movie_id);
        Ok(query.order_by_asc(rating::Column::Id).all(&self.db).await?)
    }

    pub async fn get_rating(&self, id: i32) -> AppResult<rating::Model> {
        rating::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| not_found("rating", id))
    }

    /// Every call inserts a new row; repeated votes from one address accumulate.
    pub async fn create_rating(
        &self,
        movie_id: i32,
        ip: &str,
        rate: Option<Rate>,
    ) -> AppResult<rating::Model> {
        self.require_movie(movie_id).await?;
        let model = rating::ActiveModel {
            ip: Set(ip.to_string()),
            rate: Set(rate.map(Rate::get)),
            movie_id: Set(movie_id),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(id = model.id, movie_id, rate = ?model.rate, "rating created");
        Ok(model)
    }

    pub async fn delete_rating(&self, id: i32) -> AppResult<()> {
        let deleted = rating::Entity::delete_by_id(id).exec(&self.db).await?.rows_affected;
        if deleted == 0 {
            return Err(not_found("rating", id));
        }
        Ok(())
    }

    async fn require_movie(&self, movie_id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(movie_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| missing_reference("movie", movie_id))
    }
}

fn for_movie<E, C>(query: Select<E>, column: C, movie_id: Option<i32>) -> Select<E>
where
    E: EntityTrait,
    C: ColumnTrait,
{
    match movie_id {
        Some(id) => query.filter(column.eq(id)),
        None => query,
    }
}
