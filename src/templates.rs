use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, html};

use crate::{
    config::Config,
    entities::{crew_member, movie, review},
    models::{CrewDetail, MovieDetail, REVIEW_TEXT_MAX, Rate, ReviewForm, Sidebar},
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// A rejected review submission, shown back to the user.
pub struct ReviewErrors<'a> {
    pub form: &'a ReviewForm,
    pub message: &'a str,
}

pub fn movie_list_page(
    config: &Config,
    heading: &str,
    movies: &[movie::Model],
    sidebar: &Sidebar,
) -> String {
    page(
        heading,
        html! {
            div class="max-w-6xl mx-auto px-6 py-10 grid gap-8 md:grid-cols-4" {
                main class="md:col-span-3" {
                    h1 class="text-3xl font-bold text-gray-900" { (heading) }
                    @if movies.is_empty() {
                        div class="mt-8 bg-white shadow rounded-lg p-8" {
                            p class="text-gray-600" { "No movies found." }
                        }
                    } @else {
                        div class="mt-8 grid gap-6 sm:grid-cols-2 lg:grid-cols-3" {
                            @for movie in movies {
                                (movie_card(config, movie))
                            }
                        }
                    }
                }
                (sidebar_panel(sidebar))
            }
        },
    )
}

pub fn movie_detail_page(
    config: &Config,
    detail: &MovieDetail,
    errors: Option<ReviewErrors<'_>>,
) -> String {
    let movie = &detail.movie;
    let empty = ReviewForm::default();
    let (values, message) = match &errors {
        Some(e) => (e.form, Some(e.message)),
        None => (&empty, None),
    };

    page(
        &movie.title,
        html! {
            div class="max-w-4xl mx-auto px-6 py-10" {
                a class="text-sm text-blue-600 hover:text-blue-800" href="/" { "← All movies" }
                div class="mt-6 bg-white shadow rounded-lg p-8 flex gap-8" {
                    @if !movie.poster.is_empty() {
                        img class="w-48 rounded" src=(config.media(&movie.poster)) alt=(movie.title);
                    }
                    div {
                        h1 class="text-3xl font-bold text-gray-900" {
                            (movie.title)
                            span class="ml-2 font-normal text-gray-500" { "(" (movie.year) ")" }
                        }
                        @if !movie.tagline.is_empty() {
                            p class="mt-1 italic text-gray-600" { "“" (movie.tagline) "”" }
                        }
                        @if movie.draft {
                            span class="mt-2 inline-block rounded bg-yellow-100 px-2 text-xs text-yellow-800" { "Draft" }
                        }
                        dl class="mt-4 grid grid-cols-3 gap-y-1 text-sm text-gray-700" {
                            dt class="font-medium" { "Country" } dd class="col-span-2" { (movie.country) }
                            dt class="font-medium" { "World premiere" } dd class="col-span-2" { (movie.world_premiere) }
                            @if let Some(category) = &detail.category {
                                dt class="font-medium" { "Category" } dd class="col-span-2" { (category.name) }
                            }
                            dt class="font-medium" { "Genres" }
                            dd class="col-span-2" { (join(detail.genres.iter().map(|g| g.name.as_str()))) }
                            dt class="font-medium" { "Directors" } dd class="col-span-2" { (crew_links(&detail.directors)) }
                            dt class="font-medium" { "Cast" } dd class="col-span-2" { (crew_links(&detail.actors)) }
                            dt class="font-medium" { "Budget" } dd class="col-span-2" { "$" (movie.budget) }
                            dt class="font-medium" { "Box office (USA)" } dd class="col-span-2" { "$" (movie.fees_in_usa) }
                            dt class="font-medium" { "Box office (world)" } dd class="col-span-2" { "$" (movie.fees_in_world) }
                            dt class="font-medium" { "Rating" }
                            dd class="col-span-2" {
                                @match detail.rating.average {
                                    Some(avg) => { (format!("{avg:.1}")) " / 10 (" (detail.rating.votes) " votes)" }
                                    None => { "No votes yet" }
                                }
                            }
                        }
                        (rating_form(movie))
                    }
                }

                @if !movie.description.is_empty() {
                    div class="mt-6 bg-white shadow rounded-lg p-8 text-gray-700 whitespace-pre-line" { (movie.description) }
                }

                @if !detail.stills.is_empty() {
                    div class="mt-6 grid gap-4 grid-cols-2 md:grid-cols-3" {
                        @for still in &detail.stills {
                            figure {
                                img class="rounded" src=(config.media(&still.image)) alt=(still.title);
                                figcaption class="mt-1 text-xs text-gray-500" { (still.title) }
                            }
                        }
                    }
                }

                section class="mt-10" {
                    h2 class="text-xl font-semibold text-gray-900" { "Reviews" }
                    @for thread in &detail.reviews {
                        div class="mt-4 bg-white shadow rounded-lg p-6" {
                            (review_body(&thread.review))
                            button class="mt-2 text-xs text-blue-600" type="button"
                                onclick=(format!("document.getElementById('parent').value='{}'", thread.review.id)) { "Reply" }
                            @for reply in &thread.replies {
                                div class="mt-4 ml-8 border-l-2 border-gray-200 pl-4" { (review_body(reply)) }
                            }
                        }
                    }
                    @for orphan in &detail.detached_replies {
                        div class="mt-4 ml-8 bg-gray-50 rounded-lg p-4" {
                            p class="text-xs text-gray-400" { "In reply to a removed review" }
                            (review_body(orphan))
                        }
                    }
                    (review_form(movie, values, message))
                }
            }
        },
    )
}

pub fn crew_page(config: &Config, detail: &CrewDetail) -> String {
    let member = &detail.member;
    page(
        &member.name,
        html! {
            div class="max-w-3xl mx-auto px-6 py-10" {
                a class="text-sm text-blue-600 hover:text-blue-800" href="/" { "← All movies" }
                div class="mt-6 bg-white shadow rounded-lg p-8 flex gap-8" {
                    @if !member.image.is_empty() {
                        img class="w-40 rounded" src=(config.media(&member.image)) alt=(member.name);
                    }
                    div {
                        h1 class="text-3xl font-bold text-gray-900" { (member.name) }
                        p class="mt-1 text-gray-500" { "Age: " (member.age) }
                        p class="mt-4 text-gray-700 whitespace-pre-line" { (member.description) }
                    }
                }
                (filmography("Directed", &detail.directed))
                (filmography("Appeared in", &detail.acted_in))
            }
        },
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    page(
        "Error",
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

fn page(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
            }
            body class="bg-gray-50" { (body) }
        }
    }
    .into_string()
}

fn movie_card(config: &Config, movie: &movie::Model) -> Markup {
    html! {
        a class="block bg-white shadow rounded-lg overflow-hidden hover:shadow-md" href=(movie.detail_path()) {
            @if !movie.poster.is_empty() {
                img class="w-full h-64 object-cover" src=(config.media(&movie.poster)) alt=(movie.title);
            }
            div class="p-4" {
                h2 class="font-semibold text-gray-900" { (movie.title) }
                p class="text-sm text-gray-500" { (movie.year) " · " (movie.country) }
                @if !movie.tagline.is_empty() {
                    p class="mt-1 text-sm italic text-gray-600" { (movie.tagline) }
                }
            }
        }
    }
}

fn sidebar_panel(sidebar: &Sidebar) -> Markup {
    html! {
        aside class="space-y-8" {
            form class="bg-white shadow rounded-lg p-6" method="get" action="/filter/" {
                h3 class="text-sm font-semibold text-gray-700" { "Genres" }
                @for genre in &sidebar.genres {
                    label class="mt-1 flex items-center gap-2 text-sm text-gray-700" {
                        input type="checkbox" name="genre" value=(genre.id);
                        (genre.name)
                    }
                }
                h3 class="mt-4 text-sm font-semibold text-gray-700" { "Years" }
                @for year in &sidebar.years {
                    label class="mt-1 flex items-center gap-2 text-sm text-gray-700" {
                        input type="checkbox" name="year" value=(year);
                        (year)
                    }
                }
                button class="mt-4 w-full rounded-md bg-blue-600 px-4 py-2 text-sm font-semibold text-white hover:bg-blue-700" type="submit" { "Filter" }
            }
            @if !sidebar.categories.is_empty() {
                div class="bg-white shadow rounded-lg p-6" {
                    h3 class="text-sm font-semibold text-gray-700" { "Categories" }
                    ul class="mt-2 space-y-1 text-sm text-gray-600" {
                        @for category in &sidebar.categories { li { (category.name) } }
                    }
                }
            }
            @if !sidebar.latest.is_empty() {
                div class="bg-white shadow rounded-lg p-6" {
                    h3 class="text-sm font-semibold text-gray-700" { "Latest movies" }
                    ul class="mt-2 space-y-1 text-sm" {
                        @for movie in &sidebar.latest {
                            li { a class="text-blue-600 hover:text-blue-800" href=(movie.detail_path()) { (movie.title) } }
                        }
                    }
                }
            }
        }
    }
}

fn review_body(review: &review::Model) -> Markup {
    html! {
        p class="text-sm font-semibold text-gray-900" { (review.name) }
        p class="mt-1 text-gray-700 whitespace-pre-line" { (review.text) }
    }
}

fn review_form(movie: &movie::Model, values: &ReviewForm, message: Option<&str>) -> Markup {
    let parent = values.parent.map(|p| p.to_string()).unwrap_or_default();
    html! {
        form id="review-form" class="mt-8 bg-white shadow rounded-lg p-6 space-y-4" method="post" action=(format!("/review/{}/", movie.id)) {
            h3 class="font-semibold text-gray-900" { "Leave a review" }
            @if let Some(message) = message {
                p class="rounded bg-red-50 p-3 text-sm text-red-700" { (message) }
            }
            input type="hidden" name="parent" id="parent" value=(parent);
            input class="w-full rounded-md border border-gray-300 px-3 py-2" name="name" placeholder="Name" maxlength="100" value=(values.name) required;
            input class="w-full rounded-md border border-gray-300 px-3 py-2" type="email" name="email" placeholder="Email" value=(values.email) required;
            textarea class="w-full rounded-md border border-gray-300 px-3 py-2" name="text" rows="5" maxlength=(REVIEW_TEXT_MAX) required { (values.text) }
            button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Send" }
        }
    }
}

fn rating_form(movie: &movie::Model) -> Markup {
    html! {
        form class="mt-4 flex items-center gap-2" method="post" action=(format!("/rating/{}/", movie.id)) {
            select class="rounded-md border border-gray-300 px-2 py-1 text-sm" name="rate" {
                @for rate in (Rate::MIN..=Rate::MAX).rev() {
                    option value=(rate) { (rate) }
                }
            }
            button class="rounded-md bg-gray-800 px-3 py-1 text-sm text-white" type="submit" { "Rate" }
        }
    }
}

fn crew_links(crew: &[crew_member::Model]) -> Markup {
    html! {
        @for (i, member) in crew.iter().enumerate() {
            @if i > 0 { ", " }
            a class="text-blue-600 hover:text-blue-800" href=(format!("/filmcrew/{}/detail/", urlencoding::encode(&member.name))) { (member.name) }
        }
    }
}

fn filmography(label: &str, movies: &[movie::Model]) -> Markup {
    html! {
        @if !movies.is_empty() {
            div class="mt-6 bg-white shadow rounded-lg p-6" {
                h2 class="font-semibold text-gray-900" { (label) }
                ul class="mt-2 space-y-1 text-sm" {
                    @for movie in movies {
                        li { a class="text-blue-600 hover:text-blue-800" href=(movie.detail_path()) { (movie.title) " (" (movie.year) ")" } }
                    }
                }
            }
        }
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> movie::Model {
        movie::Model {
            id: 1,
            title: "Alien <1979>".into(),
            tagline: "In space no one can hear you scream.".into(),
            description: String::new(),
            poster: "movies/alien.jpg".into(),
            year: 1979,
            country: "UK".into(),
            world_premiere: "1979-05-25".into(),
            budget: 11_000_000,
            fees_in_usa: 0,
            fees_in_world: 0,
            category_id: None,
            url: "alien".into(),
            draft: false,
        }
    }

    #[test]
    fn list_escapes_titles_and_resolves_media() {
        let html = movie_list_page(&Config::default(), "Movies", &[movie()], &Sidebar::default());
        assert!(html.contains("Alien &lt;1979&gt;"));
        assert!(html.contains(r#"src="/media/movies/alien.jpg""#));
        assert!(html.contains(r#"href="/alien/detail/""#));
    }

    #[test]
    fn rejected_review_is_redisplayed() {
        let detail = MovieDetail {
            movie: movie(),
            category: None,
            directors: Vec::new(),
            actors: Vec::new(),
            genres: Vec::new(),
            stills: Vec::new(),
            reviews: Vec::new(),
            detached_replies: Vec::new(),
            rating: Default::default(),
        };
        let form = ReviewForm {
            name: "Ann".into(),
            email: "bad".into(),
            text: "kept".into(),
            parent: Some(3),
        };
        let html = movie_detail_page(
            &Config::default(),
            &detail,
            Some(ReviewErrors { form: &form, message: "email: invalid" }),
        );
        assert!(html.contains("email: invalid"));
        assert!(html.contains(">kept</textarea>"));
        assert!(html.contains(r#"value="3""#));
        assert!(html.contains("No votes yet"));
    }
}
