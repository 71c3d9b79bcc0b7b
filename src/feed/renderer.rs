use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::FeedConfig;
use crate::error::Result;
use crate::models::Item;

const TITLE_WIDTH: usize = 80;

/// Renders stored items as an RSS 2.0 document.
pub struct FeedRenderer {
    title: String,
    link: String,
    description: String,
}

impl FeedRenderer {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            title: config.title.clone(),
            link: config.link.clone(),
            description: config.description.clone(),
        }
    }

    /// Items are emitted in the order given.
    pub fn render(&self, items: &[Item], built_at: DateTime<Utc>) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(
            "<rss version=\"2.0\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
        );
        xml.push_str("  <channel>\n");
        xml.push_str(&format!("    <title>{}</title>\n", escape_xml(&self.title)));
        xml.push_str(&format!("    <link>{}</link>\n", escape_xml(&self.link)));
        xml.push_str(&format!(
            "    <description>{}</description>\n",
            escape_xml(&self.description)
        ));
        xml.push_str(&format!(
            "    <lastBuildDate>{}</lastBuildDate>\n",
            built_at.to_rfc2822()
        ));

        for item in items {
            self.push_item(&mut xml, item);
        }

        xml.push_str("  </channel>\n");
        xml.push_str("</rss>\n");
        xml
    }

    fn push_item(&self, xml: &mut String, item: &Item) {
        xml.push_str("    <item>\n");
        xml.push_str(&format!(
            "      <title>{}</title>\n",
            escape_xml(&item_title(item))
        ));
        xml.push_str(&format!("      <link>{}</link>\n", escape_xml(&item.source_url)));
        xml.push_str(&format!(
            "      <guid isPermaLink=\"true\">{}</guid>\n",
            escape_xml(&item.source_url)
        ));
        xml.push_str(&format!(
            "      <dc:creator>{}</dc:creator>\n",
            escape_xml(&format!("{} (@{})", item.author_name, item.author_handle))
        ));
        xml.push_str(&format!(
            "      <pubDate>{}</pubDate>\n",
            item.created_at.to_rfc2822()
        ));
        xml.push_str(&format!(
            "      <description>{}</description>\n",
            escape_xml(&item_description(item))
        ));
        xml.push_str("    </item>\n");
    }
}

/// `Name (@handle): first line of the body`, cut at a word boundary.
fn item_title(item: &Item) -> String {
    let first_line = item.body_text.lines().next().unwrap_or_default().trim();
    let wrapped = textwrap::wrap(first_line, TITLE_WIDTH);
    let mut summary = wrapped.first().map(|l| l.to_string()).unwrap_or_default();
    if wrapped.len() > 1 || item.body_text.trim().lines().count() > 1 {
        summary.push('…');
    }
    format!("{} (@{}): {}", item.author_name, item.author_handle, summary)
}

fn item_description(item: &Item) -> String {
    let mut html = String::new();
    if !item.author_image_url.is_empty() {
        html.push_str(&format!(
            "<img src=\"{}\" alt=\"@{}\" /> ",
            escape_xml(&item.author_image_url),
            escape_xml(&item.author_handle)
        ));
    }
    html.push_str(&format!(
        "<p>{}</p>",
        escape_xml(&item.body_text).replace('\n', "<br />")
    ));

    let links: Vec<&str> = item.links().collect();
    if !links.is_empty() {
        html.push_str("<ul>");
        for link in links {
            let link = escape_xml(link);
            html.push_str(&format!("<li><a href=\"{}\">{}</a></li>", link, link));
        }
        html.push_str("</ul>");
    }
    html
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Replace the feed at `path` in one step so readers never see a half-written file.
pub async fn write_feed(path: &Path, document: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, document).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
