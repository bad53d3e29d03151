//! JSON administration API mounted under `/admin`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AppState,
    entities::{category, crew_member, genre, movie, movie_still, rating, review},
    error::ApiResult,
    models::{
        CategoryInput, CrewMemberInput, GenreInput, MovieInput, MovieStillInput, Rate,
        RatingInput, ReviewForm, ReviewText,
    },
    store::{MovieRecord, MovieSearch},
};

type AdminState = State<Arc<AppState>>;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/genres", get(list_genres).post(create_genre))
        .route("/genres/{id}", get(get_genre).put(update_genre).delete(delete_genre))
        .route("/crew", get(list_crew).post(create_crew_member))
        .route(
            "/crew/{id}",
            get(get_crew_member).put(update_crew_member).delete(delete_crew_member),
        )
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/publish", post(publish_movies))
        .route("/movies/unpublish", post(unpublish_movies))
        .route("/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
        .route("/movies/{id}/draft", patch(set_movie_draft))
        .route("/stills", get(list_stills).post(create_still))
        .route("/stills/{id}", get(get_still).put(update_still).delete(delete_still))
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/reviews/{id}", get(get_review).put(update_review).delete(delete_review))
        .route("/ratings", get(list_ratings).post(create_rating))
        .route("/ratings/{id}", get(get_rating).delete(delete_rating))
}

/// `?movie=<id>` narrows the still, review and rating listings.
#[derive(Debug, Default, Deserialize)]
pub struct ByMovie {
    movie: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkIds {
    ids: Vec<i32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BulkUpdated {
    updated: u64,
    message: String,
}

impl BulkUpdated {
    fn new(updated: u64) -> Self {
        let message = if updated == 1 {
            "1 record was updated".to_string()
        } else {
            format!("{updated} records were updated")
        };
        Self { updated, message }
    }
}

#[derive(Debug, Deserialize)]
pub struct DraftToggle {
    draft: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdminReviewInput {
    movie_id: i32,
    name: String,
    email: String,
    text: String,
    #[serde(default)]
    parent: Option<i32>,
}

async fn list_categories(State(state): AdminState) -> ApiResult<Json<Vec<category::Model>>> {
    Ok(Json(state.store.list_categories().await?))
}

async fn get_category(
    State(state): AdminState,
    Path(id): Path<i32>,
) -> ApiResult<Json<category::Model>> {
    Ok(Json(state.store.get_category(id).await?))
}

async fn create_category(
    State(state): AdminState,
    Json(input): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<category::Model>)> {
    Ok((StatusCode::CREATED, Json(state.store.create_category(input).await?)))
}

async fn update_category(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Json<category::Model>> {
    Ok(Json(state.store.update_category(id, input).await?))
}

async fn delete_category(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<StatusCode> {
    state.store.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_genres(State(state): AdminState) -> ApiResult<Json<Vec<genre::Model>>> {
    Ok(Json(state.store.list_genres().await?))
}

async fn get_genre(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<Json<genre::Model>> {
    Ok(Json(state.store.get_genre(id).await?))
}

async fn create_genre(
    State(state): AdminState,
    Json(input): Json<GenreInput>,
) -> ApiResult<(StatusCode, Json<genre::Model>)> {
    Ok((StatusCode::CREATED, Json(state.store.create_genre(input).await?)))
}

async fn update_genre(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(input): Json<GenreInput>,
) -> ApiResult<Json<genre::Model>> {
    Ok(Json(state.store.update_genre(id, input).await?))
}

async fn delete_genre(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<StatusCode> {
    state.store.delete_genre(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_crew(State(state): AdminState) -> ApiResult<Json<Vec<crew_member::Model>>> {
    Ok(Json(state.store.list_crew().await?))
}

async fn get_crew_member(
    State(state): AdminState,
    Path(id): Path<i32>,
) -> ApiResult<Json<crew_member::Model>> {
    Ok(Json(state.store.get_crew_member(id).await?))
}

async fn create_crew_member(
    State(state): AdminState,
    Json(input): Json<CrewMemberInput>,
) -> ApiResult<(StatusCode, Json<crew_member::Model>)> {
    Ok((StatusCode::CREATED, Json(state.store.create_crew_member(input).await?)))
}

async fn update_crew_member(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(input): Json<CrewMemberInput>,
) -> ApiResult<Json<crew_member::Model>> {
    Ok(Json(state.store.update_crew_member(id, input).await?))
}

async fn delete_crew_member(
    State(state): AdminState,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.store.delete_crew_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_movies(
    State(state): AdminState,
    Query(search): Query<MovieSearch>,
) -> ApiResult<Json<Vec<movie::Model>>> {
    Ok(Json(state.store.search_movies(search).await?))
}

async fn get_movie(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<Json<MovieRecord>> {
    Ok(Json(state.store.get_movie(id).await?))
}

async fn create_movie(
    State(state): AdminState,
    Json(input): Json<MovieInput>,
) -> ApiResult<(StatusCode, Json<MovieRecord>)> {
    Ok((StatusCode::CREATED, Json(state.store.create_movie(input).await?)))
}

async fn update_movie(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(input): Json<MovieInput>,
) -> ApiResult<Json<MovieRecord>> {
    Ok(Json(state.store.update_movie(id, input).await?))
}

async fn delete_movie(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<StatusCode> {
    state.store.delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_movie_draft(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(toggle): Json<DraftToggle>,
) -> ApiResult<Json<MovieRecord>> {
    // Resolve first so an unknown id is a 404 rather than "0 records".
    state.store.get_movie(id).await?;
    state.store.set_draft(&[id], toggle.draft).await?;
    Ok(Json(state.store.get_movie(id).await?))
}

async fn publish_movies(
    State(state): AdminState,
    Json(body): Json<BulkIds>,
) -> ApiResult<Json<BulkUpdated>> {
    let updated = state.store.set_draft(&body.ids, false).await?;
    info!(updated, "movies published");
    Ok(Json(BulkUpdated::new(updated)))
}

async fn unpublish_movies(
    State(state): AdminState,
    Json(body): Json<BulkIds>,
) -> ApiResult<Json<BulkUpdated>> {
    let updated = state.store.set_draft(&body.ids, true).await?;
    info!(updated, "movies unpublished");
    Ok(Json(BulkUpdated::new(updated)))
}

async fn list_stills(
    State(state): AdminState,
    Query(by): Query<ByMovie>,
) -> ApiResult<Json<Vec<movie_still::Model>>> {
    Ok(Json(state.store.list_stills(by.movie).await?))
}

async fn get_still(
    State(state): AdminState,
    Path(id): Path<i32>,
) -> ApiResult<Json<movie_still::Model>> {
    Ok(Json(state.store.get_still(id).await?))
}

async fn create_still(
    State(state): AdminState,
    Json(input): Json<MovieStillInput>,
) -> ApiResult<(StatusCode, Json<movie_still::Model>)> {
    Ok((StatusCode::CREATED, Json(state.store.create_still(input).await?)))
}

async fn update_still(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(input): Json<MovieStillInput>,
) -> ApiResult<Json<movie_still::Model>> {
    Ok(Json(state.store.update_still(id, input).await?))
}

async fn delete_still(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<StatusCode> {
    state.store.delete_still(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_reviews(
    State(state): AdminState,
    Query(by): Query<ByMovie>,
) -> ApiResult<Json<Vec<review::Model>>> {
    Ok(Json(state.store.list_reviews(by.movie).await?))
}

async fn get_review(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<Json<review::Model>> {
    Ok(Json(state.store.get_review(id).await?))
}

async fn create_review(
    State(state): AdminState,
    Json(input): Json<AdminReviewInput>,
) -> ApiResult<(StatusCode, Json<review::Model>)> {
    let form = ReviewForm {
        name: input.name,
        email: input.email,
        text: input.text,
        parent: input.parent,
    }
    .cleaned()?;
    Ok((StatusCode::CREATED, Json(state.store.create_review(input.movie_id, &form).await?)))
}

async fn update_review(
    State(state): AdminState,
    Path(id): Path<i32>,
    Json(input): Json<ReviewText>,
) -> ApiResult<Json<review::Model>> {
    Ok(Json(state.store.update_review_text(id, input).await?))
}

async fn delete_review(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<StatusCode> {
    state.store.delete_review(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_ratings(
    State(state): AdminState,
    Query(by): Query<ByMovie>,
) -> ApiResult<Json<Vec<rating::Model>>> {
    Ok(Json(state.store.list_ratings(by.movie).await?))
}

async fn get_rating(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<Json<rating::Model>> {
    Ok(Json(state.store.get_rating(id).await?))
}

async fn create_rating(
    State(state): AdminState,
    Json(input): Json<RatingInput>,
) -> ApiResult<(StatusCode, Json<rating::Model>)> {
    let rate = input.rate.map(Rate::try_from).transpose()?;
    let model = state.store.create_rating(input.movie_id, &input.ip, rate).await?;
    Ok((StatusCode::CREATED, Json(model)))
}

async fn delete_rating(State(state): AdminState, Path(id): Path<i32>) -> ApiResult<StatusCode> {
    state.store.delete_rating(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, db, routes};

    async fn app() -> Router {
        let state = AppState::new(Config::default(), db::memory().await);
        routes::router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn movie_body(title: &str, url: &str) -> Value {
        json!({ "title": title, "country": "US", "url": url })
    }

    #[test]
    fn bulk_message_pluralizes() {
        assert_eq!(BulkUpdated::new(1).message, "1 record was updated");
        assert_eq!(BulkUpdated::new(0).message, "0 records were updated");
        assert_eq!(BulkUpdated::new(3).message, "3 records were updated");
    }

    #[tokio::test]
    async fn category_crud() {
        let app = app().await;
        let (status, created) = call(
            &app,
            Method::POST,
            "/admin/categories",
            Some(json!({ "name": "Films", "url": "films" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            "/admin/categories",
            Some(json!({ "name": "Dup", "url": "films" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, Method::DELETE, &format!("/admin/categories/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&app, Method::GET, &format!("/admin/categories/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn bulk_publish_reports_count() {
        let app = app().await;
        let mut ids = Vec::new();
        for (title, url) in [("Heat", "heat"), ("Ronin", "ronin")] {
            let (status, body) =
                call(&app, Method::POST, "/admin/movies", Some(movie_body(title, url))).await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            ids.push(body["id"].as_i64().unwrap());
        }

        let (status, body) =
            call(&app, Method::POST, "/admin/movies/unpublish", Some(json!({ "ids": ids }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "updated": 2, "message": "2 records were updated" }));

        let (_, body) = call(
            &app,
            Method::POST,
            "/admin/movies/publish",
            Some(json!({ "ids": [ids[0]] })),
        )
        .await;
        assert_eq!(body["message"], "1 record was updated");

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/admin/movies/{}/draft", ids[0]),
            Some(json!({ "draft": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["draft"], true);
    }

    #[tokio::test]
    async fn review_moderation_keeps_author_fields() {
        let app = app().await;
        let (_, movie) = call(&app, Method::POST, "/admin/movies", Some(movie_body("Heat", "heat"))).await;

        let (status, review) = call(
            &app,
            Method::POST,
            "/admin/reviews",
            Some(json!({
                "movie_id": movie["id"],
                "name": "Ann",
                "email": "ann@example.com",
                "text": "rude words",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{review}");

        let (status, updated) = call(
            &app,
            Method::PUT,
            &format!("/admin/reviews/{}", review["id"]),
            Some(json!({ "text": "[removed]", "name": "Mallory" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["text"], "[removed]");
        assert_eq!(updated["name"], "Ann");
    }

    #[tokio::test]
    async fn rating_out_of_range_is_rejected() {
        let app = app().await;
        let (_, movie) = call(&app, Method::POST, "/admin/movies", Some(movie_body("Heat", "heat"))).await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/admin/ratings",
            Some(json!({ "movie_id": movie["id"], "ip": "10.0.0.1", "rate": 11 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &app,
            Method::POST,
            "/admin/ratings",
            Some(json!({ "movie_id": movie["id"], "ip": "10.0.0.1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, ratings) =
            call(&app, Method::GET, &format!("/admin/ratings?movie={}", movie["id"]), None).await;
        assert_eq!(ratings.as_array().unwrap().len(), 1);
    }
}
