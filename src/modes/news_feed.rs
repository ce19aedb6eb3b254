use std::sync::LazyLock;
use std::time::Instant;

use embedded_graphics::prelude::Point;
use embedded_graphics::prelude::Primitive;
use embedded_graphics::primitives::Line;
use embedded_graphics::primitives::PrimitiveStyle;
use time::OffsetDateTime;

use super::DisplayTimer;
use super::Mode;
use super::ModeError;
use crate::canvas::Canvas;
use crate::canvas::FONT_BOLD;
use crate::canvas::FONT_MEDIUM;
use crate::canvas::FONT_SMALL;
use crate::config::NewsFeedConfig;
use crate::display::Display;

static TAGS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"<[^>]*>").expect("tag pattern compiles"));

const MARGIN: i32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub published: Option<OffsetDateTime>,
}

impl Article {
    pub fn from_item(item: &rss::Item, source: &str) -> Option<Self> {
        let title = clean(item.title()?);
        if title.is_empty() {
            return None;
        }

        Some(Self {
            title,
            summary: item.description().map(clean).unwrap_or_default(),
            source: source.to_string(),
            published: crate::feed::published(item),
        })
    }

    fn matches(&self, terms: &[String]) -> bool {
        if terms.is_empty() {
            return true;
        }
        let title = self.title.to_lowercase();
        let summary = self.summary.to_lowercase();
        terms.iter().map(|t| t.to_lowercase()).any(|term| {
            let term = term.trim();
            !term.is_empty() && (title.contains(term) || summary.contains(term))
        })
    }
}

/// Strip markup and collapse whitespace.
fn clean(text: &str) -> String {
    let text = TAGS.replace_all(text, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Articles matching any of `terms`, newest first, at most `max`.
pub fn select_articles(mut articles: Vec<Article>, terms: &[String], max: usize) -> Vec<Article> {
    articles.retain(|article| article.matches(terms));
    articles.sort_by(|a, b| b.published.cmp(&a.published));
    articles.truncate(max);
    articles
}

/// Headline list from one or more RSS feeds.
pub struct NewsFeed {
    config: NewsFeedConfig,
    client: reqwest::Client,
    articles: Vec<Article>,
    last_fetch: Option<Instant>,
    timer: DisplayTimer,
}

impl NewsFeed {
    pub fn new(config: NewsFeedConfig, client: reqwest::Client) -> Self {
        Self {
            timer: DisplayTimer::new(config.display_time),
            config,
            client,
            articles: Vec::new(),
            last_fetch: None,
        }
    }

    async fn refresh(&mut self) {
        self.last_fetch = Some(Instant::now());

        let mut collected = Vec::new();
        let mut failures = 0;
        for url in &self.config.feeds {
            match crate::feed::fetch_channel(&self.client, url).await {
                Ok(channel) => {
                    let source = match channel.title().trim() {
                        "" => url.host_str().unwrap_or("feed").to_string(),
                        title => title.to_string(),
                    };
                    collected.extend(
                        channel
                            .items()
                            .iter()
                            .filter_map(|item| Article::from_item(item, &source)),
                    );
                }
                Err(error) => {
                    failures += 1;
                    tracing::error!(?error, "Failed to fetch news feed");
                }
            }
        }

        if failures == self.config.feeds.len() && !self.articles.is_empty() {
            tracing::warn!(kept = self.articles.len(), "All news feeds failed, keeping old articles");
            return;
        }

        self.articles = select_articles(
            collected,
            &self.config.search_terms,
            self.config.max_articles,
        );
        tracing::info!(count = self.articles.len(), "News updated");
    }

    fn needs_refresh(&self) -> bool {
        self.last_fetch
            .map_or(true, |last| last.elapsed() >= self.config.update_interval)
    }
}

impl Mode for NewsFeed {
    async fn update(&mut self, display: &mut dyn Display) -> Result<(), ModeError> {
        if !self.timer.is_due() {
            return Ok(());
        }
        self.timer.mark();

        if self.needs_refresh() {
            self.refresh().await;
        }

        if self.articles.is_empty() {
            let terms = match self.config.search_terms.as_slice() {
                [] => "any".to_string(),
                terms => terms.join(", "),
            };
            crate::screens::show_notice(
                display,
                "No News",
                &[
                    format!("Feeds: {}", self.config.feeds.len()),
                    format!("Search terms: {terms}"),
                ],
            )?;
            return Ok(());
        }

        let (width, height) = display.resolution();
        let frame = render(&self.articles, width, height, OffsetDateTime::now_utc());
        crate::display::present(display, frame.image(), Some(self.config.saturation))?;
        Ok(())
    }

    fn on_enter(&mut self) {
        self.timer.reset();
    }
}

pub fn render(articles: &[Article], width: u32, height: u32, now: OffsetDateTime) -> Canvas {
    let mut canvas = Canvas::new(width, height, crate::color::WHITE);
    let format = time::macros::format_description!("[day] [month repr:short] [year]");
    let bottom = height as i32 - MARGIN;

    canvas.text("News", Point::new(MARGIN, 12), &FONT_MEDIUM, crate::color::BLUE);
    let updated = now.format(&format).unwrap_or_default();
    let updated_x = width as i32 - MARGIN - (updated.chars().count() as i32 * 6);
    canvas.text(&updated, Point::new(updated_x, 16), &FONT_SMALL, crate::color::BLACK);
    crate::canvas::draw(
        &Line::new(Point::new(MARGIN, 40), Point::new(width as i32 - MARGIN, 40))
            .into_styled(PrimitiveStyle::with_stroke(crate::color::BLUE, 2)),
        &mut canvas,
    );

    let title_chars = ((width as i32 - 2 * MARGIN) / 9).max(1) as usize;
    let body_chars = ((width as i32 - 2 * MARGIN) / 6).max(1) as usize;
    let mut y = 50;

    for article in articles {
        if y + 18 > bottom {
            break;
        }

        for line in crate::canvas::wrap_text(&article.title, title_chars).iter().take(2) {
            canvas.text(line, Point::new(MARGIN, y), &FONT_BOLD, crate::color::BLACK);
            y += 18;
        }

        let meta = match article.published.and_then(|date| date.format(&format).ok()) {
            Some(date) => format!("{} | {date}", article.source),
            None => article.source.clone(),
        };
        canvas.text(&meta, Point::new(MARGIN, y), &FONT_SMALL, crate::color::RED);
        y += 14;

        for line in crate::canvas::wrap_text(&article.summary, body_chars).iter().take(2) {
            if y + 13 > bottom {
                break;
            }
            canvas.text(line, Point::new(MARGIN, y), &FONT_SMALL, crate::color::BLACK);
            y += 13;
        }
        y += 10;
    }

    canvas
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>cs.LG updates</title>
    <link>https://arxiv.org/</link>
    <description>papers</description>
    <item>
      <title>Grid Scale Storage for Renewable Energy</title>
      <description>&lt;p&gt;We study batteries.&lt;/p&gt;</description>
      <pubDate>Mon, 13 Oct 2025 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Sparse Attention</title>
      <description>A new machine learning architecture.</description>
      <pubDate>Wed, 15 Oct 2025 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Protein Folding</title>
      <description>Structure prediction.</description>
      <pubDate>Tue, 14 Oct 2025 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Undated Note on Machine Learning</title>
    </item>
  </channel>
</rss>"#;

    fn articles() -> Vec<Article> {
        let channel = rss::Channel::read_from(FEED.as_bytes()).unwrap();
        channel
            .items()
            .iter()
            .filter_map(|item| Article::from_item(item, "arxiv"))
            .collect()
    }

    #[test]
    fn test_clean_strips_markup() {
        assert_eq!(clean("<p>We  study\n batteries &amp; grids.</p>"), "We study batteries & grids.");
    }

    #[test]
    fn test_no_terms_keeps_all_newest_first() {
        let selected = select_articles(articles(), &[], 10);
        let titles: Vec<&str> = selected.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Sparse Attention",
                "Protein Folding",
                "Grid Scale Storage for Renewable Energy",
                "Undated Note on Machine Learning",
            ]
        );
    }

    #[test]
    fn test_terms_match_title_or_description() {
        let terms = vec!["machine learning".to_string(), "RENEWABLE".to_string()];
        let selected = select_articles(articles(), &terms, 10);
        let titles: Vec<&str> = selected.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Sparse Attention",
                "Grid Scale Storage for Renewable Energy",
                "Undated Note on Machine Learning",
            ]
        );
    }

    #[test]
    fn test_max_articles() {
        assert_eq!(select_articles(articles(), &[], 2).len(), 2);
    }

    #[test]
    fn test_render() {
        let now = OffsetDateTime::from_unix_timestamp(1_760_518_800).unwrap();
        let canvas = render(&select_articles(articles(), &[], 5), 800, 480, now);

        assert_eq!(canvas.image().dimensions(), (800, 480));
        assert!(canvas.image().pixels().any(|p| p == &Rgb([0, 0, 0])));
        assert!(canvas.image().pixels().any(|p| p == &Rgb([255, 0, 0])));
    }
}
