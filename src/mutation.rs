//! Public submissions: reviews and rating votes.

use sea_orm::EntityTrait;
use tracing::debug;

use crate::{
    entities::{movie, rating, review},
    error::{AppError, AppResult},
    models::{Rate, ReviewForm},
    store::CatalogStore,
};

/// Outcome of an accepted review: the stored row and where to send the user.
#[derive(Debug)]
pub struct ReviewAccepted {
    pub review: review::Model,
    pub redirect_to: String,
}

#[derive(Clone)]
pub struct Submissions {
    store: CatalogStore,
}

impl Submissions {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    pub async fn submit_review(&self, movie_id: i32, form: ReviewForm) -> AppResult<ReviewAccepted> {
        let movie = self.movie(movie_id).await?;
        let form = form.cleaned()?;
        let review = self.store.create_review(movie.id, &form).await?;
        debug!(review_id = review.id, movie = %movie.url, "review accepted");
        Ok(ReviewAccepted { review, redirect_to: movie.detail_path() })
    }

    pub async fn submit_rating(&self, movie_id: i32, ip: &str, rate: i32) -> AppResult<rating::Model> {
        let movie = self.movie(movie_id).await?;
        let rate = Rate::try_from(rate)?;
        self.store.create_rating(movie.id, ip, Some(rate)).await
    }

    /// The movie a submission targets, or `NotFound`.
    pub async fn movie(&self, movie_id: i32) -> AppResult<movie::Model> {
        movie::Entity::find_by_id(movie_id)
            .one(self.store.db())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {movie_id}")))
    }
}
