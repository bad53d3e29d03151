//! Aggregated values that populate the filter controls.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    entities::{genre, movie},
    error::AppResult,
};

#[derive(Clone)]
pub struct CatalogFacets {
    db: DatabaseConnection,
}

impl CatalogFacets {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Release years of published movies, ascending, without repeats.
    pub async fn list_distinct_years(&self) -> AppResult<Vec<i32>> {
        Ok(movie::Entity::find()
            .select_only()
            .column(movie::Column::Year)
            .filter(movie::Column::Draft.eq(false))
            .distinct()
            .order_by_asc(movie::Column::Year)
            .into_tuple()
            .all(&self.db)
            .await?)
    }

    pub async fn list_genres(&self) -> AppResult<Vec<genre::Model>> {
        Ok(genre::Entity::find().order_by_asc(genre::Column::Name).all(&self.db).await?)
    }
}
