//! Wire models for the movie/TV database API.
//!
//! - `UserProfile`, `Registration`, `ProfileUpdate`: accounts
//! - `Title`, `Review`, `NewReview`: titles and what users say about them
//! - `Person`, `FilmographyEntry`: cast and crew
//! - `NewsArticle`, `Trivia`: editorial content
//! - `WatchlistItem`, `WatchStatus`: the personal watchlist
//! - `Listing`: plain or paginated list bodies
//!
//! Unknown fields are ignored and optional fields default, so backend
//! additions do not break the client.

pub mod listing;
pub mod news;
pub mod person;
pub mod title;
pub mod user;
pub mod watchlist;

pub use listing::Listing;
pub use news::{NewTrivia, NewsArticle, Trivia};
pub use person::{FilmographyEntry, Person, PersonRef};
pub use title::{
    validate_score, Episode, Genre, NewReview, Review, Title, TitleCredit, TitleRef, TitleType,
    MAX_SCORE, MIN_SCORE,
};
pub use user::{ProfileUpdate, Registration, UserProfile, UserRef};
pub use watchlist::{WatchStatus, WatchlistItem};
