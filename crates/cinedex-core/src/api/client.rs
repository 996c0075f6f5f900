//! Typed calls for the movie/TV database resources.
//!
//! Every call goes through the `Gateway`, so it carries the session's token
//! and survives an access-token expiry transparently.

use serde::Serialize;
use tracing::debug;

use super::endpoints::{self, item};
use super::{ApiError, ApiRequest, Gateway};
use crate::auth::Session;
use crate::models::{
    validate_score, FilmographyEntry, Genre, Listing, NewReview, NewTrivia, NewsArticle, Person,
    ProfileUpdate, Review, Title, TitleType, Trivia, UserProfile, WatchStatus, WatchlistItem,
};

/// Filters for the title list. Unset fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct TitleQuery {
    pub search: Option<String>,
    pub title_type: Option<TitleType>,
    pub genre: Option<i64>,
    /// Backend ordering expression, e.g. `-start_year`
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

impl TitleQuery {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(ref search) = self.search {
            request = request.query("search", search);
        }
        if let Some(title_type) = self.title_type {
            request = request.query("title_type", title_type.as_str());
        }
        if let Some(genre) = self.genre {
            request = request.query("genres", genre);
        }
        if let Some(ref ordering) = self.ordering {
            request = request.query("ordering", ordering);
        }
        if let Some(page) = self.page {
            request = request.query("page", page);
        }
        request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriviaFilter {
    #[default]
    All,
    Title(i64),
    Person(i64),
}

/// Where a search looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Titles of every type
    #[default]
    All,
    Titles,
    People,
    Type(TitleType),
}

impl std::str::FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(SearchScope::All),
            "title" | "titles" => Ok(SearchScope::Titles),
            "person" | "people" => Ok(SearchScope::People),
            other => other
                .parse::<TitleType>()
                .map(SearchScope::Type)
                .map_err(|_| format!("Unknown search scope: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResults {
    Titles(Listing<Title>),
    People(Listing<Person>),
}

impl SearchResults {
    pub fn len(&self) -> usize {
        match self {
            SearchResults::Titles(titles) => titles.items().len(),
            SearchResults::People(people) => people.items().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize)]
struct ReviewBody<'a> {
    title: i64,
    #[serde(flatten)]
    review: &'a NewReview,
}

#[derive(Serialize)]
struct RatingBody {
    title: i64,
    score: u8,
}

#[derive(Serialize)]
struct WatchlistBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<i64>,
    status: WatchStatus,
}

/// Resource client. Clone is cheap; clones share the session.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
}

impl ApiClient {
    pub fn new(session: &Session) -> Self {
        Self {
            gateway: session.gateway(),
        }
    }

    pub fn session(&self) -> &Session {
        self.gateway.session()
    }

    // ========================================================================
    // Titles
    // ========================================================================

    pub async fn titles(&self, query: &TitleQuery) -> Result<Listing<Title>, ApiError> {
        let request = query.apply(ApiRequest::get(endpoints::TITLES));
        self.gateway.execute_json(request).await
    }

    pub async fn title(&self, id: i64) -> Result<Title, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(item(endpoints::TITLES, id)))
            .await
    }

    pub async fn trending_titles(&self) -> Result<Listing<Title>, ApiError> {
        let request = ApiRequest::get(endpoints::TITLES).query("sort", "trending");
        self.gateway.execute_json(request).await
    }

    pub async fn genres(&self) -> Result<Listing<Genre>, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(endpoints::GENRES))
            .await
    }

    // ========================================================================
    // Reviews and ratings
    // ========================================================================

    pub async fn title_reviews(&self, title_id: i64) -> Result<Listing<Review>, ApiError> {
        let request = ApiRequest::get(endpoints::REVIEWS).query("title", title_id);
        self.gateway.execute_json(request).await
    }

    pub async fn recent_reviews(&self) -> Result<Listing<Review>, ApiError> {
        let request = ApiRequest::get(endpoints::REVIEWS).query("ordering", "-created_at");
        self.gateway.execute_json(request).await
    }

    /// Post a review. Too-short content and out-of-range ratings are rejected
    /// before anything is sent.
    pub async fn add_review(&self, title_id: i64, review: &NewReview) -> Result<Review, ApiError> {
        review.validate().map_err(ApiError::InvalidRequest)?;
        let request = ApiRequest::post(endpoints::REVIEWS).json(&ReviewBody {
            title: title_id,
            review,
        })?;
        debug!(title_id, rating = review.rating, "Posting review");
        self.gateway.execute_json(request).await
    }

    pub async fn rate_title(&self, title_id: i64, score: u8) -> Result<(), ApiError> {
        validate_score(score).map_err(ApiError::InvalidRequest)?;
        let request = ApiRequest::post(endpoints::RATINGS).json(&RatingBody {
            title: title_id,
            score,
        })?;
        self.gateway.execute_empty(request).await
    }

    // ========================================================================
    // People
    // ========================================================================

    pub async fn people(&self, search: Option<&str>) -> Result<Listing<Person>, ApiError> {
        let mut request = ApiRequest::get(endpoints::PERSONS);
        if let Some(search) = search {
            request = request.query("search", search);
        }
        self.gateway.execute_json(request).await
    }

    pub async fn person(&self, id: i64) -> Result<Person, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(item(endpoints::PERSONS, id)))
            .await
    }

    pub async fn filmography(&self, person_id: i64) -> Result<Listing<FilmographyEntry>, ApiError> {
        let path = format!("{}filmography/", item(endpoints::PERSONS, person_id));
        self.gateway.execute_json(ApiRequest::get(path)).await
    }

    // ========================================================================
    // News and trivia
    // ========================================================================

    pub async fn news(&self) -> Result<Listing<NewsArticle>, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(endpoints::NEWS))
            .await
    }

    pub async fn news_item(&self, id: i64) -> Result<NewsArticle, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(item(endpoints::NEWS, id)))
            .await
    }

    pub async fn latest_news(&self) -> Result<Listing<NewsArticle>, ApiError> {
        let request = ApiRequest::get(endpoints::NEWS).query("ordering", "-published_at");
        self.gateway.execute_json(request).await
    }

    pub async fn trivia(&self, filter: TriviaFilter) -> Result<Listing<Trivia>, ApiError> {
        let request = match filter {
            TriviaFilter::All => ApiRequest::get(endpoints::TRIVIA),
            TriviaFilter::Title(id) => ApiRequest::get(endpoints::TRIVIA).query("title", id),
            TriviaFilter::Person(id) => ApiRequest::get(endpoints::TRIVIA).query("person", id),
        };
        self.gateway.execute_json(request).await
    }

    pub async fn add_trivia(&self, trivia: &NewTrivia) -> Result<(), ApiError> {
        if trivia.content.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Trivia content is required".to_string()));
        }
        if trivia.title.is_none() && trivia.person.is_none() {
            return Err(ApiError::InvalidRequest(
                "Trivia must be about a title or a person".to_string(),
            ));
        }
        let request = ApiRequest::post(endpoints::TRIVIA).json(trivia)?;
        self.gateway.execute_empty(request).await
    }

    // ========================================================================
    // Watchlist
    // ========================================================================

    pub async fn watchlist(&self) -> Result<Listing<WatchlistItem>, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(endpoints::WATCHLISTS))
            .await
    }

    pub async fn add_to_watchlist(&self, title_id: i64, status: WatchStatus) -> Result<(), ApiError> {
        let request = ApiRequest::post(endpoints::WATCHLISTS).json(&WatchlistBody {
            title: Some(title_id),
            status,
        })?;
        self.gateway.execute_empty(request).await
    }

    pub async fn update_watchlist_status(&self, item_id: i64, status: WatchStatus) -> Result<(), ApiError> {
        let request = ApiRequest::patch(item(endpoints::WATCHLISTS, item_id))
            .json(&WatchlistBody { title: None, status })?;
        self.gateway.execute_empty(request).await
    }

    pub async fn remove_from_watchlist(&self, item_id: i64) -> Result<(), ApiError> {
        self.gateway
            .execute_empty(ApiRequest::delete(item(endpoints::WATCHLISTS, item_id)))
            .await
    }

    // ========================================================================
    // Search and users
    // ========================================================================

    /// Search titles or people. `All` and `Titles` both search titles.
    pub async fn search(&self, query: &str, scope: SearchScope) -> Result<SearchResults, ApiError> {
        let title_type = match scope {
            SearchScope::People => {
                return self.people(Some(query)).await.map(SearchResults::People);
            }
            SearchScope::Type(title_type) => Some(title_type),
            SearchScope::All | SearchScope::Titles => None,
        };
        let query = TitleQuery {
            search: Some(query.to_string()),
            title_type,
            ..TitleQuery::default()
        };
        self.titles(&query).await.map(SearchResults::Titles)
    }

    pub async fn user(&self, id: i64) -> Result<UserProfile, ApiError> {
        self.gateway
            .execute_json(ApiRequest::get(item(endpoints::USERS, id)))
            .await
    }

    pub async fn update_user(&self, id: i64, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let request = ApiRequest::patch(item(endpoints::USERS, id)).json(update)?;
        self.gateway.execute_json(request).await
    }
}
