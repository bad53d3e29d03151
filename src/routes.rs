use std::{collections::BTreeSet, convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{ConnectInfo, Form, FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::{
    AppState, admin,
    error::{AppError, AppResult},
    models::{RatingForm, ReviewForm, Sidebar},
    templates::{self, ReviewErrors},
};

pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/filter/", get(filter))
        .route("/{slug}/detail/", get(movie_detail))
        .route("/review/{movie_id}/", post(add_review))
        .route("/rating/{movie_id}/", post(add_rating))
        .route("/filmcrew/{name}/detail/", get(crew_detail))
        .nest("/admin", admin::router());

    // A media URL on another host is served by someone else. Media cannot
    // share the root with the pages.
    match state.config.media_url.strip_prefix('/').map(|p| p.trim_end_matches('/')) {
        Some("") => tracing::warn!("media url is the site root; not serving media"),
        Some(prefix) => {
            let mount = format!("/{prefix}");
            router = router.nest_service(&mount, ServeDir::new(&state.config.media_root));
        }
        None => {}
    }

    router.with_state(state)
}

/// Address of the caller: the first `X-Forwarded-For` hop, else the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let ip = match forwarded {
            Some(ip) => ip.to_string(),
            None => parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        };
        Ok(Self(ip))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    year: Vec<i32>,
    #[serde(default)]
    genre: Vec<i32>,
}

async fn sidebar(state: &AppState) -> AppResult<Sidebar> {
    Ok(Sidebar {
        categories: state.catalog.list_categories().await?,
        genres: state.facets.list_genres().await?,
        years: state.facets.list_distinct_years().await?,
        latest: state.catalog.latest_movies(state.config.latest_movies).await?,
    })
}

pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let movies = state.catalog.list_published_movies().await?;
    let sidebar = sidebar(&state).await?;
    Ok(Html(templates::movie_list_page(&state.config, "Movies", &movies, &sidebar)))
}

pub async fn filter(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> AppResult<Html<String>> {
    let years: BTreeSet<i32> = params.year.into_iter().collect();
    let genres: BTreeSet<i32> = params.genre.into_iter().collect();
    let movies = state.catalog.filter_movies(years, genres).await?;
    let sidebar = sidebar(&state).await?;
    Ok(Html(templates::movie_list_page(&state.config, "Filtered movies", &movies, &sidebar)))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let detail = state.catalog.movie_detail(&slug).await?;
    Ok(Html(templates::movie_detail_page(&state.config, &detail, None)))
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Response> {
    match state.submissions.submit_review(movie_id, form.clone()).await {
        Ok(accepted) => Ok(Redirect::to(&accepted.redirect_to).into_response()),
        Err(err @ (AppError::Validation(_) | AppError::InvalidReference(_))) => {
            let movie = state.submissions.movie(movie_id).await?;
            let detail = state.catalog.movie_detail(&movie.url).await?;
            let message = err.to_string();
            let errors = ReviewErrors { form: &form, message: &message };
            let body = templates::movie_detail_page(&state.config, &detail, Some(errors));
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(body)).into_response())
        }
        Err(err) => Err(err),
    }
}

pub async fn add_rating(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i32>,
    ClientIp(ip): ClientIp,
    Form(form): Form<RatingForm>,
) -> AppResult<Redirect> {
    state.submissions.submit_rating(movie_id, &ip, form.rate).await?;
    let movie = state.submissions.movie(movie_id).await?;
    Ok(Redirect::to(&movie.detail_path()))
}

pub async fn crew_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<Html<String>> {
    let detail = state.catalog.crew_by_name(&name).await?;
    Ok(Html(templates::crew_page(&state.config, &detail)))
}
