//! RSS fetching and image URL extraction shared by the feed modes.

use std::sync::LazyLock;

static IMG_SRC: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#)
        .expect("image tag pattern compiles")
});

const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Failed to fetch feed '{url}'")]
    Fetch {
        url: url::Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse feed '{url}'")]
    Parse {
        url: url::Url,
        #[source]
        source: rss::Error,
    },
}

pub async fn fetch_channel(
    client: &reqwest::Client,
    url: &url::Url,
) -> Result<rss::Channel, FeedError> {
    let fetch = |source| FeedError::Fetch {
        url: url.clone(),
        source,
    };

    let bytes = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch)?
        .bytes()
        .await
        .map_err(fetch)?;

    rss::Channel::read_from(&bytes[..]).map_err(|source| FeedError::Parse {
        url: url.clone(),
        source,
    })
}

/// Every image URL an item mentions, in document order.
///
/// Looks at `media:content` (also inside `media:group`), image enclosures and
/// `<img src>` tags in the description and content.
pub fn item_image_urls(item: &rss::Item) -> Vec<String> {
    let mut urls = Vec::new();

    if let Some(media) = item.extensions().get("media") {
        let direct = media.get("content").into_iter().flatten();
        let grouped = media
            .get("group")
            .into_iter()
            .flatten()
            .flat_map(|group| group.children().get("content").into_iter().flatten());

        for content in direct.chain(grouped) {
            let is_image = content
                .attrs()
                .get("medium")
                .map_or(true, |medium| medium == "image");
            if let Some(url) = content.attrs().get("url").filter(|_| is_image) {
                urls.push(url.clone());
            }
        }
    }

    if let Some(enclosure) = item.enclosure() {
        if enclosure.mime_type().starts_with("image/") {
            urls.push(enclosure.url().to_string());
        }
    }

    for html in [item.description(), item.content()].into_iter().flatten() {
        urls.extend(IMG_SRC.captures_iter(html).map(|c| c[1].replace("&amp;", "&")));
    }

    urls
}

/// Whether the URL mentions one of the image file extensions we can decode.
pub fn has_image_extension(url: &str) -> bool {
    let url = url.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| url.contains(ext))
}

/// Collect usable image URLs from a channel, de-duplicated in feed order.
pub fn image_urls<F>(channel: &rss::Channel, max: usize, is_wanted: F) -> Vec<url::Url>
where
    F: Fn(&str) -> bool,
{
    let mut seen = std::collections::HashSet::new();

    channel
        .items()
        .iter()
        .flat_map(item_image_urls)
        .filter(|candidate| is_wanted(candidate.as_str()))
        .filter_map(|candidate| url::Url::parse(&candidate).ok())
        .filter(|url| seen.insert(url.clone()))
        .take(max)
        .collect()
}

/// Publication date of an item, when present and in RFC 2822 form.
pub fn published(item: &rss::Item) -> Option<time::OffsetDateTime> {
    let raw = item.pub_date()?.trim();
    let raw = match raw.strip_suffix(" GMT").or_else(|| raw.strip_suffix(" UT")) {
        Some(stripped) => std::borrow::Cow::Owned(format!("{stripped} +0000")),
        None => std::borrow::Cow::Borrowed(raw),
    };
    time::OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc2822).ok()
}

#[cfg(test)]
pub(crate) mod testing {
    pub const TUMBLR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>dinosaurs</title>
    <link>https://example.tumblr.com/</link>
    <description>posts</description>
    <item>
      <title>one</title>
      <description>&lt;p&gt;&lt;img src="https://64.media.tumblr.com/a/s1280x1920/one.jpg"/&gt;&lt;img src="https://64.media.tumblr.com/a/s75x75/one.jpg"/&gt;&lt;/p&gt;</description>
      <pubDate>Tue, 14 Oct 2025 09:00:00 +0000</pubDate>
    </item>
    <item>
      <title>two</title>
      <description>&lt;img src='https://64.media.tumblr.com/b/s1280x1920/two.png'&gt;&lt;img src="https://64.media.tumblr.com/avatar_b_128.png"&gt;</description>
      <pubDate>Wed, 15 Oct 2025 09:00:00 +0000</pubDate>
    </item>
    <item>
      <title>repeat</title>
      <description>&lt;img src="https://64.media.tumblr.com/a/s1280x1920/one.jpg"/&gt;&lt;a href="https://example.com/page"&gt;link&lt;/a&gt;</description>
    </item>
  </channel>
</rss>"#;

    pub const DEVIANTART: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>gallery</title>
    <link>https://www.deviantart.com/</link>
    <description>deviations</description>
    <item>
      <title>castle</title>
      <media:content url="https://images-wixmp.example.com/f/castle.jpg" medium="image" height="900" width="1600"/>
      <media:thumbnail url="https://images-wixmp.example.com/f/castle_thumbnail.jpg" height="150" width="150"/>
    </item>
    <item>
      <title>video</title>
      <media:content url="https://images-wixmp.example.com/f/clip.mp4" medium="video"/>
    </item>
    <item>
      <title>forest</title>
      <enclosure url="https://images-wixmp.example.com/f/forest.png" length="0" type="image/png"/>
    </item>
  </channel>
</rss>"#;
}
