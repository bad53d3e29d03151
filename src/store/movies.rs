use std::collections::BTreeSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Query},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::{CatalogStore, missing_reference, not_found};
use crate::{
    entities::{
        category, crew_member, genre, movie, movie_actor, movie_director, movie_genre,
        movie_still, rating, review,
    },
    error::{AppError, AppResult},
    models::MovieInput,
};

/// Admin list filters. `q` matches the title or the category name.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieSearch {
    pub q: Option<String>,
    pub category: Option<i32>,
    pub year: Option<i32>,
}

/// A movie row with the ids of its many-to-many links.
#[derive(Clone, Debug, Serialize)]
pub struct MovieRecord {
    #[serde(flatten)]
    pub movie: movie::Model,
    pub genres: Vec<i32>,
    pub directors: Vec<i32>,
    pub actors: Vec<i32>,
}

impl CatalogStore {
    pub async fn search_movies(&self, search: MovieSearch) -> AppResult<Vec<movie::Model>> {
        let mut query = movie::Entity::find();

        if let Some(q) = search.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let category_match = Query::select()
                .column(category::Column::Id)
                .from(category::Entity)
                .and_where(category::Column::Name.contains(q))
                .to_owned();
            query = query.filter(
                Condition::any()
                    .add(movie::Column::Title.contains(q))
                    .add(movie::Column::CategoryId.in_subquery(category_match)),
            );
        }
        if let Some(category_id) = search.category {
            query = query.filter(movie::Column::CategoryId.eq(category_id));
        }
        if let Some(year) = search.year {
            query = query.filter(movie::Column::Year.eq(year));
        }

        Ok(query.order_by_asc(movie::Column::Id).all(&self.db).await?)
    }

    pub async fn get_movie(&self, id: i32) -> AppResult<MovieRecord> {
        let movie =
            movie::Entity::find_by_id(id).one(&self.db).await?.ok_or_else(|| not_found("movie", id))?;
        self.record(movie).await
    }

    pub async fn create_movie(&self, input: MovieInput) -> AppResult<MovieRecord> {
        input.validate()?;
        let txn = self.db.begin().await?;
        check_references(&txn, &input).await?;

        let links = Links::from(&input);
        let mut active = <movie::ActiveModel as Default>::default();
        assign(&mut active, input);
        let movie = active.insert(&txn).await?;
        links.replace(&txn, movie.id).await?;

        txn.commit().await?;
        info!(id = movie.id, url = %movie.url, draft = movie.draft, "movie created");
        self.record(movie).await
    }

    pub async fn update_movie(&self, id: i32, input: MovieInput) -> AppResult<MovieRecord> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let existing =
            movie::Entity::find_by_id(id).one(&txn).await?.ok_or_else(|| not_found("movie", id))?;
        check_references(&txn, &input).await?;

        let links = Links::from(&input);
        let mut active = existing.into_active_model();
        assign(&mut active, input);
        let movie = active.update(&txn).await?;
        links.replace(&txn, movie.id).await?;

        txn.commit().await?;
        info!(id = movie.id, "movie updated");
        self.record(movie).await
    }

    /// Sets the draft flag on every listed movie and returns how many rows changed.
    pub async fn set_draft(&self, ids: &[i32], draft: bool) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let updated = movie::Entity::update_many()
            .col_expr(movie::Column::Draft, Expr::value(draft))
            .filter(movie::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await?
            .rows_affected;
        info!(requested = ids.len(), updated, draft, "movie draft flag changed");
        Ok(updated)
    }

    /// Deletes the movie with its stills, reviews, ratings and link rows.
    ///
    /// Replies on other movies whose parent is removed here become detached.
    pub async fn delete_movie(&self, id: i32) -> AppResult<()> {
        let txn = self.db.begin().await?;

        if movie::Entity::find_by_id(id).one(&txn).await?.is_none() {
            return Err(not_found("movie", id));
        }

        let own_reviews = Query::select()
            .column(review::Column::Id)
            .from(review::Entity)
            .and_where(review::Column::MovieId.eq(id))
            .to_owned();
        review::Entity::update_many()
            .col_expr(review::Column::ParentId, Expr::value(Option::<i32>::None))
            .col_expr(review::Column::Detached, Expr::value(true))
            .filter(review::Column::MovieId.ne(id))
            .filter(review::Column::ParentId.in_subquery(own_reviews))
            .exec(&txn)
            .await?;

        review::Entity::update_many()
            .col_expr(review::Column::ParentId, Expr::value(Option::<i32>::None))
            .filter(review::Column::MovieId.eq(id))
            .exec(&txn)
            .await?;
        let reviews =
            review::Entity::delete_many().filter(review::Column::MovieId.eq(id)).exec(&txn).await?;
        let ratings =
            rating::Entity::delete_many().filter(rating::Column::MovieId.eq(id)).exec(&txn).await?;
        let stills = movie_still::Entity::delete_many()
            .filter(movie_still::Column::MovieId.eq(id))
            .exec(&txn)
            .await?;
        Links::default().replace(&txn, id).await?;

        movie::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(
            id,
            reviews = reviews.rows_affected,
            ratings = ratings.rows_affected,
            stills = stills.rows_affected,
            "movie deleted"
        );
        Ok(())
    }

    async fn record(&self, movie: movie::Model) -> AppResult<MovieRecord> {
        let genres = movie_genre::Entity::find()
            .select_only()
            .column(movie_genre::Column::GenreId)
            .filter(movie_genre::Column::MovieId.eq(movie.id))
            .order_by_asc(movie_genre::Column::GenreId)
            .into_tuple()
            .all(&self.db)
            .await?;
        let directors = movie_director::Entity::find()
            .select_only()
            .column(movie_director::Column::CrewMemberId)
            .filter(movie_director::Column::MovieId.eq(movie.id))
            .order_by_asc(movie_director::Column::CrewMemberId)
            .into_tuple()
            .all(&self.db)
            .await?;
        let actors = movie_actor::Entity::find()
            .select_only()
            .column(movie_actor::Column::CrewMemberId)
            .filter(movie_actor::Column::MovieId.eq(movie.id))
            .order_by_asc(movie_actor::Column::CrewMemberId)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(MovieRecord { movie, genres, directors, actors })
    }
}

fn assign(active: &mut movie::ActiveModel, input: MovieInput) {
    let premiere = input.world_premiere.unwrap_or_else(|| jiff::Zoned::now().date());
    active.title = Set(input.title);
    active.tagline = Set(input.tagline);
    active.description = Set(input.description);
    active.poster = Set(input.poster);
    active.year = Set(input.year);
    active.country = Set(input.country);
    active.world_premiere = Set(premiere.to_string());
    active.budget = Set(input.budget);
    active.fees_in_usa = Set(input.fees_in_usa);
    active.fees_in_world = Set(input.fees_in_world);
    active.category_id = Set(input.category_id);
    active.url = Set(input.url);
    active.draft = Set(input.draft);
}

async fn check_references(txn: &DatabaseTransaction, input: &MovieInput) -> AppResult<()> {
    if let Some(category_id) = input.category_id {
        if category::Entity::find_by_id(category_id).one(txn).await?.is_none() {
            return Err(missing_reference("category", category_id));
        }
    }

    let genres: BTreeSet<i32> = input.genres.iter().copied().collect();
    let found =
        genre::Entity::find().filter(genre::Column::Id.is_in(genres.clone())).count(txn).await?;
    if found != genres.len() as u64 {
        return Err(AppError::InvalidReference("unknown genre id".to_string()));
    }

    let crew: BTreeSet<i32> = input.directors.iter().chain(&input.actors).copied().collect();
    let found = crew_member::Entity::find()
        .filter(crew_member::Column::Id.is_in(crew.clone()))
        .count(txn)
        .await?;
    if found != crew.len() as u64 {
        return Err(AppError::InvalidReference("unknown crew member id".to_string()));
    }

    Ok(())
}

/// Many-to-many link ids for one movie, de-duplicated.
#[derive(Default)]
struct Links {
    genres: BTreeSet<i32>,
    directors: BTreeSet<i32>,
    actors: BTreeSet<i32>,
}

impl From<&MovieInput> for Links {
    fn from(input: &MovieInput) -> Self {
        Self {
            genres: input.genres.iter().copied().collect(),
            directors: input.directors.iter().copied().collect(),
            actors: input.actors.iter().copied().collect(),
        }
    }
}

impl Links {
    async fn replace<C: ConnectionTrait>(self, conn: &C, movie_id: i32) -> AppResult<()> {
        movie_genre::Entity::delete_many()
            .filter(movie_genre::Column::MovieId.eq(movie_id))
            .exec(conn)
            .await?;
        movie_director::Entity::delete_many()
            .filter(movie_director::Column::MovieId.eq(movie_id))
            .exec(conn)
            .await?;
        movie_actor::Entity::delete_many()
            .filter(movie_actor::Column::MovieId.eq(movie_id))
            .exec(conn)
            .await?;

        for genre_id in self.genres {
            let link =
                movie_genre::ActiveModel { movie_id: Set(movie_id), genre_id: Set(genre_id) };
            movie_genre::Entity::insert(link).exec_without_returning(conn).await?;
        }
        for crew_member_id in self.directors {
            let link = movie_director::ActiveModel {
                movie_id: Set(movie_id),
                crew_member_id: Set(crew_member_id),
            };
            movie_director::Entity::insert(link).exec_without_returning(conn).await?;
        }
        for crew_member_id in self.actors {
            let link = movie_actor::ActiveModel {
                movie_id: Set(movie_id),
                crew_member_id: Set(crew_member_id),
            };
            movie_actor::Entity::insert(link).exec_without_returning(conn).await?;
        }
        Ok(())
    }
}
