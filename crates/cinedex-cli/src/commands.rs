//! Command-line parsing and the commands themselves.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use cinedex_core::api::{ApiClient, SearchResults, SearchScope, TitleQuery, TriviaFilter};
use cinedex_core::models::{NewReview, Registration, WatchStatus};
use cinedex_core::{Config, Session};

use crate::format;

/// Width used when truncating free text in lists
const LINE_WIDTH: usize = 72;

pub const USAGE: &str = "\
Usage: cinedex <command> [args]

Account:
  login [username]                 Log in (password is prompted)
  logout                           Forget stored credentials
  whoami                           Show the logged-in user
  register                         Create an account

Browse:
  titles [--trending]              List titles
  title <id>                       Show one title with cast and reviews
  search <query> [scope]           scope: all, title, person, MOVIE, TV_SERIES,
                                   TV_EPISODE, VIDEO_GAME
  person <id>                      Show a person and their filmography
  news                             Latest news
  trivia [--title <id> | --person <id>]

Your lists (login required):
  watchlist                        Show your watchlist
  watch <title_id> [status]        Add a title (status: plan-to-watch, watching,
                                   completed, dropped)
  watch-status <item_id> <status>  Change a watchlist entry's status
  unwatch <item_id>                Remove a watchlist entry
  rate <title_id> <score>          Rate a title 1-10
  review <title_id> <rating> <text...>
";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login(Option<String>),
    Logout,
    WhoAmI,
    Register,
    Titles { trending: bool },
    Title(i64),
    Search { query: String, scope: SearchScope },
    Person(i64),
    News,
    Trivia(TriviaFilter),
    Watchlist,
    Watch { title_id: i64, status: WatchStatus },
    SetStatus { item_id: i64, status: WatchStatus },
    Unwatch(i64),
    Rate { title_id: i64, score: u8 },
    Review { title_id: i64, rating: u8, content: String },
    Help,
}

impl Command {
    /// Parse the arguments after the program name
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "login" => Command::Login(rest.first().cloned()),
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "register" => Command::Register,
            "titles" => Command::Titles {
                trending: rest.iter().any(|a| a == "--trending"),
            },
            "title" => Command::Title(id_arg(rest, 0, "title id")?),
            "search" => {
                let query = rest
                    .first()
                    .filter(|q| !q.trim().is_empty())
                    .ok_or_else(|| anyhow!("search needs a query"))?
                    .clone();
                let scope = match rest.get(1) {
                    Some(scope) => scope.parse::<SearchScope>().map_err(anyhow::Error::msg)?,
                    None => SearchScope::All,
                };
                Command::Search { query, scope }
            }
            "person" => Command::Person(id_arg(rest, 0, "person id")?),
            "news" => Command::News,
            "trivia" => Command::Trivia(match rest.first().map(String::as_str) {
                None => TriviaFilter::All,
                Some("--title") => TriviaFilter::Title(id_arg(rest, 1, "title id")?),
                Some("--person") => TriviaFilter::Person(id_arg(rest, 1, "person id")?),
                Some(other) => bail!("Unknown trivia filter: {}", other),
            }),
            "watchlist" => Command::Watchlist,
            "watch" => Command::Watch {
                title_id: id_arg(rest, 0, "title id")?,
                status: match rest.get(1) {
                    Some(status) => status.parse::<WatchStatus>().map_err(anyhow::Error::msg)?,
                    None => WatchStatus::default(),
                },
            },
            "watch-status" => Command::SetStatus {
                item_id: id_arg(rest, 0, "watchlist item id")?,
                status: rest
                    .get(1)
                    .ok_or_else(|| anyhow!("watch-status needs a status"))?
                    .parse::<WatchStatus>()
                    .map_err(anyhow::Error::msg)?,
            },
            "unwatch" => Command::Unwatch(id_arg(rest, 0, "watchlist item id")?),
            "rate" => Command::Rate {
                title_id: id_arg(rest, 0, "title id")?,
                score: score_arg(rest, 1)?,
            },
            "review" => {
                let title_id = id_arg(rest, 0, "title id")?;
                let rating = score_arg(rest, 1)?;
                let content = rest.get(2..).unwrap_or_default().join(" ");
                Command::Review {
                    title_id,
                    rating,
                    content,
                }
            }
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };
        Ok(command)
    }

    /// Commands that only make sense for a logged-in user
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Command::WhoAmI
                | Command::Watchlist
                | Command::Watch { .. }
                | Command::SetStatus { .. }
                | Command::Unwatch(_)
                | Command::Rate { .. }
                | Command::Review { .. }
        )
    }
}

fn id_arg(args: &[String], index: usize, what: &str) -> Result<i64> {
    let raw = args.get(index).ok_or_else(|| anyhow!("Missing {}", what))?;
    raw.parse::<i64>()
        .with_context(|| format!("Invalid {}: {}", what, raw))
}

fn score_arg(args: &[String], index: usize) -> Result<u8> {
    let raw = args.get(index).ok_or_else(|| anyhow!("Missing score"))?;
    raw.parse::<u8>()
        .with_context(|| format!("Invalid score: {}", raw))
}

/// Everything a command can touch
pub struct CommandContext<'a> {
    pub config: &'a mut Config,
    pub session: &'a Session,
    pub api: &'a ApiClient,
}

pub async fn run(command: Command, ctx: CommandContext<'_>) -> Result<()> {
    match command {
        Command::Help => print!("{}", USAGE),
        Command::Login(username) => login(ctx, username).await?,
        Command::Logout => {
            ctx.session.logout();
            println!("Logged out.");
        }
        Command::WhoAmI => match ctx.session.current_user() {
            Some(user) => {
                println!("{} (#{})", user.username, user.id);
                if let Some(ref email) = user.email {
                    println!("  Email:  {}", email);
                }
                println!("  Joined: {}", format::optional_date(user.date_joined.as_ref()));
                if let Some(ref bio) = user.bio {
                    println!("  {}", format::truncate(bio, LINE_WIDTH));
                }
            }
            None => {
                let user = ctx.session.refresh_profile().await?;
                println!("{} (#{})", user.username, user.id);
            }
        },
        Command::Register => register(ctx).await?,
        Command::Titles { trending } => {
            let titles = if trending {
                ctx.api.trending_titles().await?
            } else {
                ctx.api.titles(&TitleQuery::default()).await?
            };
            for title in titles.items() {
                println!("{:>6}  {}", title.id, format::title_line(title));
            }
            if titles.has_more() {
                println!("({} of {} shown)", titles.items().len(), titles.total());
            }
        }
        Command::Title(id) => show_title(ctx.api, id).await?,
        Command::Search { query, scope } => match ctx.api.search(&query, scope).await? {
            SearchResults::Titles(titles) => {
                for title in titles.items() {
                    println!("{:>6}  {}", title.id, format::title_line(title));
                }
            }
            SearchResults::People(people) => {
                for person in people.items() {
                    match person.lifespan() {
                        Some(years) => println!("{:>6}  {} ({})", person.id, person.name, years),
                        None => println!("{:>6}  {}", person.id, person.name),
                    }
                }
            }
        },
        Command::Person(id) => {
            let person = ctx.api.person(id).await?;
            println!("{}", person.name);
            if let Some(years) = person.lifespan() {
                println!("  {}", years);
            }
            if let Some(ref bio) = person.bio {
                println!("  {}", format::truncate(bio, LINE_WIDTH * 3));
            }
            let filmography = ctx.api.filmography(id).await?;
            for entry in filmography.items() {
                println!(
                    "{:>6}  {} as {}",
                    entry.title.id,
                    format::title_line(&entry.title),
                    entry.role_display()
                );
            }
        }
        Command::News => {
            for article in ctx.api.latest_news().await?.items() {
                println!(
                    "{:>6}  {}  {}",
                    article.id,
                    format::optional_date(article.published_at.as_ref()),
                    format::truncate(&article.title, LINE_WIDTH)
                );
            }
        }
        Command::Trivia(filter) => {
            for fact in ctx.api.trivia(filter).await?.items() {
                match fact.subject() {
                    Some(subject) => println!("- [{}] {}", subject, fact.content),
                    None => println!("- {}", fact.content),
                }
            }
        }
        Command::Watchlist => {
            let watchlist = ctx.api.watchlist().await?;
            if watchlist.items().is_empty() {
                println!("Your watchlist is empty.");
            }
            for entry in watchlist.items() {
                println!(
                    "{:>6}  {:<14} {}",
                    entry.id,
                    entry.status.label(),
                    format::title_line(&entry.title)
                );
            }
        }
        Command::Watch { title_id, status } => {
            ctx.api.add_to_watchlist(title_id, status).await?;
            println!("Added title #{} as {}.", title_id, status);
        }
        Command::SetStatus { item_id, status } => {
            ctx.api.update_watchlist_status(item_id, status).await?;
            println!("Watchlist entry #{} is now {}.", item_id, status);
        }
        Command::Unwatch(item_id) => {
            ctx.api.remove_from_watchlist(item_id).await?;
            println!("Removed watchlist entry #{}.", item_id);
        }
        Command::Rate { title_id, score } => {
            ctx.api.rate_title(title_id, score).await?;
            println!("Rated title #{} {}/10.", title_id, score);
        }
        Command::Review {
            title_id,
            rating,
            content,
        } => {
            let review = NewReview {
                rating,
                content,
                contains_spoilers: false,
            };
            let created = ctx.api.add_review(title_id, &review).await?;
            println!("Review #{} posted.", created.id);
        }
    }
    Ok(())
}

async fn login(ctx: CommandContext<'_>, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt_username(ctx.config.last_username.as_deref())?,
    };
    let password = prompt_password("Password: ")?;

    println!("\nAuthenticating...");
    if let Err(e) = ctx.session.login(&username, &password).await {
        let message = ctx.session.snapshot().error.unwrap_or_else(|| e.to_string());
        bail!("{}", message);
    }

    ctx.config.last_username = Some(username);
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    match ctx.session.current_user() {
        Some(user) => println!("Logged in as {}.", user.username),
        None => println!("Logged in. Your profile could not be loaded yet."),
    }
    Ok(())
}

async fn register(ctx: CommandContext<'_>) -> Result<()> {
    let username = prompt_line("Username: ")?;
    let email = prompt_line("Email: ")?;
    let password = prompt_password("Password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let registration = Registration::new(username, email, password);
    if let Err(errors) = registration.validate() {
        bail!("{}", errors);
    }

    if let Err(e) = ctx.session.register(&registration).await {
        let message = ctx.session.snapshot().error.unwrap_or_else(|| e.to_string());
        bail!("{}", message);
    }
    println!(
        "Account created. Run `cinedex login {}` to sign in.",
        registration.username
    );
    Ok(())
}

async fn show_title(api: &ApiClient, id: i64) -> Result<()> {
    let title = api.title(id).await?;
    println!("{}", format::title_line(&title));
    let genres = title.genre_names();
    if !genres.is_empty() {
        println!("  {}", genres.join(", "));
    }
    println!("  {}", format::rating(title.average_rating, title.num_votes));
    if let Some(ref plot) = title.plot {
        println!("\n{}", plot);
    }

    let cast: Vec<String> = title
        .cast()
        .filter_map(|credit| credit.person.as_ref().and_then(|p| p.name.clone()))
        .take(8)
        .collect();
    if !cast.is_empty() {
        println!("\nStarring: {}", cast.join(", "));
    }

    let reviews = api.title_reviews(id).await?;
    if !reviews.items().is_empty() {
        println!("\nReviews:");
    }
    for review in reviews.items().iter().take(5) {
        let author = review
            .user
            .as_ref()
            .map(|u| u.display_name())
            .unwrap_or_else(|| "anonymous".to_string());
        let score = review
            .rating
            .map(|r| format!("{}/10", r))
            .unwrap_or_default();
        let content = if review.contains_spoilers {
            "[spoilers hidden]".to_string()
        } else {
            format::truncate(&review.content, LINE_WIDTH)
        };
        println!("  {} {}  {}", author, score, content);
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_username(last_username: Option<&str>) -> Result<String> {
    match last_username {
        Some(last) => {
            let input = prompt_line(&format!("Username [{}]: ", last))?;
            Ok(if input.is_empty() { last.to_string() } else { input })
        }
        None => prompt_line("Username: "),
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinedex_core::models::TitleType;

    fn parse(line: &str) -> Result<Command> {
        let args: Vec<String> = line.split_whitespace().map(String::from).collect();
        Command::parse(&args)
    }

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse("").unwrap(), Command::Help);
        assert_eq!(parse("login").unwrap(), Command::Login(None));
        assert_eq!(
            parse("login agnes").unwrap(),
            Command::Login(Some("agnes".to_string()))
        );
        assert_eq!(parse("titles --trending").unwrap(), Command::Titles { trending: true });
        assert_eq!(parse("title 42").unwrap(), Command::Title(42));
    }

    #[test]
    fn test_parse_search_scope() {
        assert_eq!(
            parse("search zelda VIDEO_GAME").unwrap(),
            Command::Search {
                query: "zelda".to_string(),
                scope: SearchScope::Type(TitleType::VideoGame)
            }
        );
        assert_eq!(
            parse("search varda person").unwrap(),
            Command::Search {
                query: "varda".to_string(),
                scope: SearchScope::People
            }
        );
        assert!(parse("search").is_err());
    }

    #[test]
    fn test_parse_watchlist_commands() {
        assert_eq!(
            parse("watch 9").unwrap(),
            Command::Watch {
                title_id: 9,
                status: WatchStatus::PlanToWatch
            }
        );
        assert_eq!(
            parse("watch-status 3 completed").unwrap(),
            Command::SetStatus {
                item_id: 3,
                status: WatchStatus::Completed
            }
        );
        assert!(parse("watch-status 3").is_err());
        assert!(parse("unwatch abc").is_err());
    }

    #[test]
    fn test_parse_review_joins_text() {
        assert_eq!(
            parse("review 4 8 Slow but rewarding").unwrap(),
            Command::Review {
                title_id: 4,
                rating: 8,
                content: "Slow but rewarding".to_string()
            }
        );
        assert_eq!(
            parse("trivia --person 5").unwrap(),
            Command::Trivia(TriviaFilter::Person(5))
        );
    }

    #[test]
    fn test_requires_login() {
        assert!(Command::Watchlist.requires_login());
        assert!(!Command::News.requires_login());
        assert!(!Command::Login(None).requires_login());
    }
}
