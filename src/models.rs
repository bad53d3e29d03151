use jiff::civil::Date;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    entities::{category, crew_member, genre, movie, movie_still, review},
    error::AppError,
};

pub const REVIEW_TEXT_MAX: u64 = 5000;

/// Lowercase/uppercase ASCII letters, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

/// Treats an empty form field as absent.
pub fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 160), custom(function = "validate_slug"))]
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GenreInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 160), custom(function = "validate_slug"))]
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CrewMemberInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 32767))]
    pub age: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MovieInput {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub tagline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default = "default_year")]
    #[validate(range(min = 0, max = 32767))]
    pub year: i32,
    #[validate(length(max = 50))]
    pub country: String,
    /// Defaults to today.
    #[serde(default)]
    pub world_premiere: Option<Date>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub budget: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub fees_in_usa: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub fees_in_world: i64,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[validate(length(max = 160), custom(function = "validate_slug"))]
    pub url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub directors: Vec<i32>,
    #[serde(default)]
    pub actors: Vec<i32>,
    #[serde(default)]
    pub genres: Vec<i32>,
}

fn default_year() -> i32 {
    2010
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MovieStillInput {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub movie_id: i32,
}

/// Public review form. `parent` is the id of the review being answered.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ReviewForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = REVIEW_TEXT_MAX))]
    pub text: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent: Option<i32>,
}

impl ReviewForm {
    /// Normalizes whitespace around name and email, then validates.
    pub fn cleaned(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}

/// Moderated review body; name and email are not editable.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ReviewText {
    #[validate(length(min = 1, max = REVIEW_TEXT_MAX))]
    pub text: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RatingForm {
    pub rate: i32,
}

/// A rating vote, always within 1..=10.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Rate(i32);

impl Rate {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 10;

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Rate {
    type Error = AppError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::Validation(format!(
                "rate must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RatingInput {
    pub movie_id: i32,
    pub ip: String,
    #[serde(default)]
    pub rate: Option<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub votes: u64,
    pub average: Option<f64>,
}

/// A top-level review with its direct replies.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewThread {
    pub review: review::Model,
    pub replies: Vec<review::Model>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovieDetail {
    pub movie: movie::Model,
    pub category: Option<category::Model>,
    pub directors: Vec<crew_member::Model>,
    pub actors: Vec<crew_member::Model>,
    pub genres: Vec<genre::Model>,
    pub stills: Vec<movie_still::Model>,
    pub reviews: Vec<ReviewThread>,
    /// Replies whose parent review was deleted.
    pub detached_replies: Vec<review::Model>,
    pub rating: RatingSummary,
}

#[derive(Clone, Debug, Serialize)]
pub struct CrewDetail {
    pub member: crew_member::Model,
    pub directed: Vec<movie::Model>,
    pub acted_in: Vec<movie::Model>,
}

/// Filter-panel data shared by the listing pages.
#[derive(Clone, Debug, Default)]
pub struct Sidebar {
    pub categories: Vec<category::Model>,
    pub genres: Vec<genre::Model>,
    pub years: Vec<i32>,
    pub latest: Vec<movie::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(text: &str) -> ReviewForm {
        ReviewForm {
            name: "Ann".into(),
            email: "ann@example.com".into(),
            text: text.into(),
            parent: None,
        }
    }

    #[test]
    fn review_text_limit_counts_characters() {
        assert!(form(&"a".repeat(5000)).cleaned().is_ok());
        assert!(matches!(form(&"a".repeat(5001)).cleaned(), Err(AppError::Validation(_))));
        assert!(form(&"ё".repeat(5000)).cleaned().is_ok());
    }

    #[test]
    fn review_requires_name_and_valid_email() {
        let mut f = form("fine");
        f.name = "   ".into();
        assert!(f.cleaned().is_err());

        let mut f = form("fine");
        f.email = "not-an-email".into();
        assert!(f.cleaned().is_err());
    }

    #[test]
    fn rate_bounds() {
        assert!(Rate::try_from(0).is_err());
        assert!(Rate::try_from(11).is_err());
        assert_eq!(Rate::try_from(1).unwrap().get(), 1);
        assert_eq!(Rate::try_from(10).unwrap().get(), 10);
    }

    #[test]
    fn slugs() {
        assert!(validate_slug("the-matrix_1999").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug("slash/").is_err());
    }

    #[test]
    fn empty_parent_field_is_none() {
        let f: ReviewForm =
            parse_form("name=a&email=a%40b.co&text=hi&parent=").expect("parse");
        assert_eq!(f.parent, None);
        let f: ReviewForm =
            parse_form("name=a&email=a%40b.co&text=hi&parent=7").expect("parse");
        assert_eq!(f.parent, Some(7));
    }

    fn parse_form(body: &str) -> Result<ReviewForm, serde_json::Error> {
        let pairs: serde_json::Map<String, serde_json::Value> = body
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| {
                let v = urlencoding::decode(v).map(|c| c.into_owned()).unwrap_or_default();
                (k.to_string(), serde_json::Value::String(v))
            })
            .collect();
        serde_json::from_value(serde_json::Value::Object(pairs))
    }
}
