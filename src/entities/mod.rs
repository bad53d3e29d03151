pub mod category;
pub mod crew_member;
pub mod genre;
pub mod movie;
pub mod movie_actor;
pub mod movie_director;
pub mod movie_genre;
pub mod movie_still;
pub mod rating;
pub mod review;
