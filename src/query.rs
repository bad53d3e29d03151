//! Read side of the catalog used by the public pages.

use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    QuerySelect,
    sea_query::{Query, SimpleExpr},
};
use tracing::debug;

use crate::{
    entities::{
        category, crew_member, genre, movie, movie_actor, movie_director, movie_genre,
        movie_still, rating, review,
    },
    error::{AppError, AppResult},
    models::{CrewDetail, MovieDetail, RatingSummary, ReviewThread},
};

/// A typed predicate over movies, compiled to a SQL condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoviePredicate {
    Published,
    YearIn(BTreeSet<i32>),
    /// Tagged with at least one of the genres.
    HasAnyGenre(BTreeSet<i32>),
    Any(Vec<MoviePredicate>),
    All(Vec<MoviePredicate>),
}

impl MoviePredicate {
    /// `year ∈ years OR genre ∈ genres`. Empty sets contribute nothing.
    pub fn year_or_genre(years: BTreeSet<i32>, genres: BTreeSet<i32>) -> Self {
        let mut any = Vec::new();
        if !years.is_empty() {
            any.push(Self::YearIn(years));
        }
        if !genres.is_empty() {
            any.push(Self::HasAnyGenre(genres));
        }
        Self::Any(any)
    }

    /// Returns `None` when the predicate can match nothing.
    pub fn into_condition(self) -> Option<Condition> {
        match self {
            Self::Published => Some(Condition::all().add(movie::Column::Draft.eq(false))),
            Self::YearIn(years) if years.is_empty() => None,
            Self::YearIn(years) => Some(Condition::all().add(movie::Column::Year.is_in(years))),
            Self::HasAnyGenre(genres) if genres.is_empty() => None,
            Self::HasAnyGenre(genres) => Some(Condition::all().add(has_any_genre(genres))),
            Self::Any(parts) => {
                let parts: Vec<_> = parts.into_iter().filter_map(Self::into_condition).collect();
                if parts.is_empty() {
                    return None;
                }
                Some(parts.into_iter().fold(Condition::any(), |acc, part| acc.add(part)))
            }
            Self::All(parts) => parts
                .into_iter()
                .map(Self::into_condition)
                .try_fold(Condition::all(), |acc, part| part.map(|p| acc.add(p))),
        }
    }
}

// A subquery keeps each movie a single row however many genres match.
fn has_any_genre(genres: BTreeSet<i32>) -> SimpleExpr {
    movie::Column::Id.in_subquery(
        Query::select()
            .column(movie_genre::Column::MovieId)
            .from(movie_genre::Entity)
            .and_where(movie_genre::Column::GenreId.is_in(genres))
            .to_owned(),
    )
}

#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
}

impl Catalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn movies_matching(&self, predicate: MoviePredicate) -> AppResult<Vec<movie::Model>> {
        let Some(condition) = predicate.into_condition() else {
            return Ok(Vec::new());
        };
        Ok(movie::Entity::find()
            .filter(condition)
            .order_by_asc(movie::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn list_published_movies(&self) -> AppResult<Vec<movie::Model>> {
        self.movies_matching(MoviePredicate::Published).await
    }

    /// Drafts are returned too; only listings hide them.
    pub async fn get_movie_by_slug(&self, slug: &str) -> AppResult<movie::Model> {
        movie::Entity::find()
            .filter(movie::Column::Url.eq(slug))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {slug:?}")))
    }

    pub async fn filter_movies(
        &self,
        years: BTreeSet<i32>,
        genres: BTreeSet<i32>,
    ) -> AppResult<Vec<movie::Model>> {
        debug!(?years, ?genres, "filtering movies");
        self.movies_matching(MoviePredicate::year_or_genre(years, genres)).await
    }

    pub async fn list_top_level_reviews(&self, movie_id: i32) -> AppResult<Vec<review::Model>> {
        Ok(review::Entity::find()
            .filter(review::Column::MovieId.eq(movie_id))
            .filter(review::Column::ParentId.is_null())
            .filter(review::Column::Detached.eq(false))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn movie_detail(&self, slug: &str) -> AppResult<MovieDetail> {
        let movie = self.get_movie_by_slug(slug).await?;

        let category = movie.find_related(category::Entity).one(&self.db).await?;
        let genres =
            movie.find_related(genre::Entity).order_by_asc(genre::Column::Name).all(&self.db).await?;
        let directors = self.crew_of(CrewRole::Director, movie.id).await?;
        let actors = self.crew_of(CrewRole::Actor, movie.id).await?;
        let stills = movie
            .find_related(movie_still::Entity)
            .order_by_asc(movie_still::Column::Id)
            .all(&self.db)
            .await?;

        let top_level = self.list_top_level_reviews(movie.id).await?;
        let mut replies = self.replies_to(top_level.iter().map(|r| r.id).collect()).await?;
        let reviews = top_level
            .into_iter()
            .map(|review| ReviewThread {
                replies: replies.remove(&review.id).unwrap_or_default(),
                review,
            })
            .collect();

        let detached_replies = review::Entity::find()
            .filter(review::Column::MovieId.eq(movie.id))
            .filter(review::Column::Detached.eq(true))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?;

        let rating = self.rating_summary(movie.id).await?;

        Ok(MovieDetail {
            movie,
            category,
            directors,
            actors,
            genres,
            stills,
            reviews,
            detached_replies,
            rating,
        })
    }

    /// Looks a crew member up by name. Names are not unique; the earliest
    /// entry wins.
    pub async fn crew_by_name(&self, name: &str) -> AppResult<CrewDetail> {
        let member = crew_member::Entity::find()
            .filter(crew_member::Column::Name.eq(name))
            .order_by_asc(crew_member::Column::Id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("crew member {name:?}")))?;

        let directed = self.movies_of(CrewRole::Director, member.id).await?;
        let acted_in = self.movies_of(CrewRole::Actor, member.id).await?;
        Ok(CrewDetail { member, directed, acted_in })
    }

    pub async fn list_categories(&self) -> AppResult<Vec<category::Model>> {
        Ok(category::Entity::find().order_by_asc(category::Column::Id).all(&self.db).await?)
    }

    /// First `limit` movies in insertion order.
    pub async fn latest_movies(&self, limit: u64) -> AppResult<Vec<movie::Model>> {
        Ok(movie::Entity::find()
            .order_by_asc(movie::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn rating_summary(&self, movie_id: i32) -> AppResult<RatingSummary> {
        let rates: Vec<Option<i32>> = rating::Entity::find()
            .select_only()
            .column(rating::Column::Rate)
            .filter(rating::Column::MovieId.eq(movie_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        let rates: Vec<i32> = rates.into_iter().flatten().collect();
        let votes = rates.len() as u64;
        let average =
            (votes > 0).then(|| rates.iter().map(|&r| f64::from(r)).sum::<f64>() / votes as f64);
        Ok(RatingSummary { votes, average })
    }

    async fn replies_to(&self, parents: Vec<i32>) -> AppResult<HashMap<i32, Vec<review::Model>>> {
        let mut by_parent: HashMap<i32, Vec<review::Model>> = HashMap::new();
        if parents.is_empty() {
            return Ok(by_parent);
        }
        let replies = review::Entity::find()
            .filter(review::Column::ParentId.is_in(parents))
            .order_by_asc(review::Column::Id)
            .all(&self.db)
            .await?;
        for reply in replies {
            if let Some(parent) = reply.parent_id {
                by_parent.entry(parent).or_default().push(reply);
            }
        }
        Ok(by_parent)
    }

    async fn crew_of(&self, role: CrewRole, movie_id: i32) -> AppResult<Vec<crew_member::Model>> {
        let ids = match role {
            CrewRole::Director => Query::select()
                .column(movie_director::Column::CrewMemberId)
                .from(movie_director::Entity)
                .and_where(movie_director::Column::MovieId.eq(movie_id))
                .to_owned(),
            CrewRole::Actor => Query::select()
                .column(movie_actor::Column::CrewMemberId)
                .from(movie_actor::Entity)
                .and_where(movie_actor::Column::MovieId.eq(movie_id))
                .to_owned(),
        };
        Ok(crew_member::Entity::find()
            .filter(crew_member::Column::Id.in_subquery(ids))
            .order_by_asc(crew_member::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Published movies the member worked on in the given role.
    async fn movies_of(&self, role: CrewRole, crew_id: i32) -> AppResult<Vec<movie::Model>> {
        let ids = match role {
            CrewRole::Director => Query::select()
                .column(movie_director::Column::MovieId)
                .from(movie_director::Entity)
                .and_where(movie_director::Column::CrewMemberId.eq(crew_id))
                .to_owned(),
            CrewRole::Actor => Query::select()
                .column(movie_actor::Column::MovieId)
                .from(movie_actor::Entity)
                .and_where(movie_actor::Column::CrewMemberId.eq(crew_id))
                .to_owned(),
        };
        Ok(movie::Entity::find()
            .filter(movie::Column::Id.in_subquery(ids))
            .filter(movie::Column::Draft.eq(false))
            .order_by_asc(movie::Column::Id)
            .all(&self.db)
            .await?)
    }
}

#[derive(Clone, Copy, Debug)]
enum CrewRole {
    Director,
    Actor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{CrewMemberInput, Rate, ReviewForm},
        store::{CatalogStore, fixtures},
    };

    async fn setup() -> (CatalogStore, Catalog) {
        let store = fixtures::store().await;
        let catalog = Catalog::new(store.db().clone());
        (store, catalog)
    }

    fn set(values: &[i32]) -> BTreeSet<i32> {
        values.iter().copied().collect()
    }

    fn ids(movies: &[movie::Model]) -> Vec<i32> {
        movies.iter().map(|m| m.id).collect()
    }

    fn review(text: &str, parent: Option<i32>) -> ReviewForm {
        ReviewForm {
            name: "Eve".into(),
            email: "eve@example.com".into(),
            text: text.into(),
            parent,
        }
    }

    #[tokio::test]
    async fn draft_lifecycle() {
        let (store, catalog) = setup().await;
        let drama = fixtures::category(&store, "Drama", "drama").await;
        let mut input = fixtures::movie_input("Test", "test-1", 2010);
        input.category_id = Some(drama.id);
        let m1 = store.create_movie(input).await.unwrap().movie;

        assert_eq!(ids(&catalog.list_published_movies().await.unwrap()), vec![m1.id]);

        store.set_draft(&[m1.id], true).await.unwrap();
        assert!(catalog.list_published_movies().await.unwrap().is_empty());

        let by_slug = catalog.get_movie_by_slug("test-1").await.unwrap();
        assert_eq!(by_slug.id, m1.id);
        assert!(by_slug.draft);
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        let (_, catalog) = setup().await;
        assert!(matches!(catalog.get_movie_by_slug("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn filter_by_year_only() {
        let (store, catalog) = setup().await;
        let drama = fixtures::genre(&store, "Drama").await;
        let crime = fixtures::genre(&store, "Crime").await;

        let mut input = fixtures::movie_input("Inception", "inception", 2010);
        input.genres = vec![drama.id, crime.id];
        let inception = store.create_movie(input).await.unwrap().movie;
        let shutter = fixtures::movie(&store, "Shutter Island", "shutter-island", 2010).await;
        fixtures::movie(&store, "Memento", "memento", 2000).await;

        let found = catalog.filter_movies(set(&[2010]), set(&[])).await.unwrap();
        assert_eq!(ids(&found), vec![inception.id, shutter.id]);
    }

    #[tokio::test]
    async fn filter_is_union_without_duplicates() {
        let (store, catalog) = setup().await;
        let drama = fixtures::genre(&store, "Drama").await;
        let crime = fixtures::genre(&store, "Crime").await;

        let mut input = fixtures::movie_input("Both", "both", 2010);
        input.genres = vec![drama.id, crime.id];
        let both = store.create_movie(input).await.unwrap().movie;
        let year_only = fixtures::movie(&store, "Year", "year", 2010).await;
        let mut input = fixtures::movie_input("Genre", "genre", 1999);
        input.genres = vec![crime.id];
        let genre_only = store.create_movie(input).await.unwrap().movie;
        fixtures::movie(&store, "Neither", "neither", 1980).await;

        let combined =
            catalog.filter_movies(set(&[2010]), set(&[drama.id, crime.id])).await.unwrap();
        assert_eq!(ids(&combined), vec![both.id, year_only.id, genre_only.id]);

        let by_genre = catalog.filter_movies(set(&[]), set(&[drama.id, crime.id])).await.unwrap();
        assert_eq!(ids(&by_genre), vec![both.id, genre_only.id]);

        let by_year = catalog.filter_movies(set(&[2010]), set(&[])).await.unwrap();
        let union: BTreeSet<i32> = ids(&by_genre).into_iter().chain(ids(&by_year)).collect();
        assert!(ids(&combined).iter().all(|id| union.contains(id)));
    }

    #[tokio::test]
    async fn empty_filter_matches_nothing() {
        let (store, catalog) = setup().await;
        fixtures::movie(&store, "Any", "any", 2010).await;
        assert!(catalog.filter_movies(set(&[]), set(&[])).await.unwrap().is_empty());
    }

    #[test]
    fn predicate_compilation() {
        assert!(MoviePredicate::year_or_genre(set(&[]), set(&[])).into_condition().is_none());
        assert!(MoviePredicate::YearIn(set(&[])).into_condition().is_none());
        assert!(
            MoviePredicate::All(vec![MoviePredicate::Published, MoviePredicate::YearIn(set(&[]))])
                .into_condition()
                .is_none()
        );
        assert!(MoviePredicate::year_or_genre(set(&[2010]), set(&[])).into_condition().is_some());
    }

    #[tokio::test]
    async fn all_predicate_narrows_to_published() {
        let (store, catalog) = setup().await;
        let visible = fixtures::movie(&store, "Visible", "visible", 2010).await;
        let hidden = fixtures::movie(&store, "Hidden", "hidden", 2010).await;
        store.set_draft(&[hidden.id], true).await.unwrap();

        let found = catalog
            .movies_matching(MoviePredicate::All(vec![
                MoviePredicate::Published,
                MoviePredicate::YearIn(set(&[2010])),
            ]))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![visible.id]);
    }

    #[tokio::test]
    async fn top_level_reviews_exclude_replies_and_detached() {
        let (store, catalog) = setup().await;
        let movie = fixtures::movie(&store, "Alien", "alien", 1979).await;

        let first = store.create_review(movie.id, &review("first", None)).await.unwrap();
        let doomed = store.create_review(movie.id, &review("doomed", None)).await.unwrap();
        store.create_review(movie.id, &review("reply", Some(first.id))).await.unwrap();
        let orphan = store.create_review(movie.id, &review("orphan", Some(doomed.id))).await.unwrap();
        store.delete_review(doomed.id).await.unwrap();

        let top = catalog.list_top_level_reviews(movie.id).await.unwrap();
        assert_eq!(top.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first.id]);
        assert!(top.iter().all(|r| r.parent_id.is_none()));

        let detail = catalog.movie_detail("alien").await.unwrap();
        assert_eq!(detail.reviews.len(), 1);
        assert_eq!(detail.reviews[0].replies.len(), 1);
        assert_eq!(detail.detached_replies.iter().map(|r| r.id).collect::<Vec<_>>(), vec![orphan.id]);
    }

    #[tokio::test]
    async fn movie_detail_collects_relations() {
        let (store, catalog) = setup().await;
        let scifi = fixtures::genre(&store, "Sci-Fi").await;
        let director = store
            .create_crew_member(CrewMemberInput {
                name: "Ridley Scott".into(),
                age: 85,
                description: String::new(),
                image: String::new(),
            })
            .await
            .unwrap();
        let actor = store
            .create_crew_member(CrewMemberInput {
                name: "Sigourney Weaver".into(),
                age: 73,
                description: String::new(),
                image: String::new(),
            })
            .await
            .unwrap();

        let mut input = fixtures::movie_input("Alien", "alien", 1979);
        input.genres = vec![scifi.id];
        input.directors = vec![director.id];
        input.actors = vec![actor.id];
        let movie = store.create_movie(input).await.unwrap().movie;
        store.create_rating(movie.id, "1.1.1.1", Some(Rate::try_from(9).unwrap())).await.unwrap();
        store.create_rating(movie.id, "1.1.1.2", Some(Rate::try_from(6).unwrap())).await.unwrap();
        store.create_rating(movie.id, "1.1.1.3", None).await.unwrap();

        let detail = catalog.movie_detail("alien").await.unwrap();
        assert_eq!(detail.genres, vec![scifi]);
        assert_eq!(detail.directors, vec![director.clone()]);
        assert_eq!(detail.actors, vec![actor]);
        assert_eq!(detail.rating, RatingSummary { votes: 2, average: Some(7.5) });

        let crew = catalog.crew_by_name("Ridley Scott").await.unwrap();
        assert_eq!(crew.member, director);
        assert_eq!(ids(&crew.directed), vec![movie.id]);
        assert!(crew.acted_in.is_empty());
        assert!(matches!(catalog.crew_by_name("Nobody").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn every_stored_review_is_shown() {
        let (store, catalog) = setup().await;
        let movie = fixtures::movie(&store, "Alien", "alien", 1979).await;
        let top = store.create_review(movie.id, &review("top", None)).await.unwrap();
        let reply = store.create_review(movie.id, &review("r1", Some(top.id))).await.unwrap();
        assert!(store.create_review(movie.id, &review("r2", Some(reply.id))).await.is_err());

        let stored = store.list_reviews(Some(movie.id)).await.unwrap().len();
        let detail = catalog.movie_detail("alien").await.unwrap();
        let shown = detail.reviews.iter().map(|t| 1 + t.replies.len()).sum::<usize>()
            + detail.detached_replies.len();
        assert_eq!(stored, shown);
    }

    #[tokio::test]
    async fn crew_name_lookup_prefers_lowest_id() {
        let (store, catalog) = setup().await;
        let member = |description: &str| CrewMemberInput {
            name: "John Smith".into(),
            age: 40,
            description: description.into(),
            image: String::new(),
        };
        let first = store.create_crew_member(member("first")).await.unwrap();
        let second = store.create_crew_member(member("second")).await.unwrap();
        assert!(first.id < second.id);

        let found = catalog.crew_by_name("John Smith").await.unwrap();
        assert_eq!(found.member, first);
    }

    #[tokio::test]
    async fn latest_movies_in_insertion_order() {
        let (store, catalog) = setup().await;
        let a = fixtures::movie(&store, "A", "a", 2000).await;
        let b = fixtures::movie(&store, "B", "b", 2001).await;
        fixtures::movie(&store, "C", "c", 2002).await;
        assert_eq!(ids(&catalog.latest_movies(2).await.unwrap()), vec![a.id, b.id]);
    }
}
