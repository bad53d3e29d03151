//! Persistent catalog entities and their integrity rules.
//!
//! Every operation that touches more than one row runs in a single
//! transaction so a failed request never leaves half-applied cascades.

mod catalog;
mod feedback;
mod movies;

use sea_orm::DatabaseConnection;

pub use movies::{MovieRecord, MovieSearch};

use crate::error::AppError;

#[derive(Clone)]
pub struct CatalogStore {
    db: DatabaseConnection,
}

impl CatalogStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn not_found(what: &str, id: i32) -> AppError {
    AppError::NotFound(format!("{what} {id}"))
}

fn missing_reference(what: &str, id: i32) -> AppError {
    AppError::InvalidReference(format!("{what} {id} does not exist"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use jiff::civil::date;

    use super::CatalogStore;
    use crate::{
        entities::{category, genre, movie},
        models::{CategoryInput, GenreInput, MovieInput},
    };

    pub async fn store() -> CatalogStore {
        CatalogStore::new(crate::db::memory().await)
    }

    pub fn movie_input(title: &str, url: &str, year: i32) -> MovieInput {
        MovieInput {
            title: title.to_string(),
            tagline: String::new(),
            description: String::new(),
            poster: format!("movies/{url}.jpg"),
            year,
            country: "USA".to_string(),
            world_premiere: Some(date(year as i16, 1, 1)),
            budget: 0,
            fees_in_usa: 0,
            fees_in_world: 0,
            category_id: None,
            url: url.to_string(),
            draft: false,
            directors: Vec::new(),
            actors: Vec::new(),
            genres: Vec::new(),
        }
    }

    pub async fn movie(store: &CatalogStore, title: &str, url: &str, year: i32) -> movie::Model {
        store.create_movie(movie_input(title, url, year)).await.expect("create movie").movie
    }

    pub async fn genre(store: &CatalogStore, name: &str) -> genre::Model {
        store
            .create_genre(GenreInput {
                name: name.to_string(),
                description: String::new(),
                url: name.to_lowercase(),
            })
            .await
            .expect("create genre")
    }

    pub async fn category(store: &CatalogStore, name: &str, url: &str) -> category::Model {
        store
            .create_category(CategoryInput {
                name: name.to_string(),
                description: String::new(),
                url: url.to_string(),
            })
            .await
            .expect("create category")
    }
}
