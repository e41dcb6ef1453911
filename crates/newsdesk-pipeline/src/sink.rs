//! Persistence of finalized articles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use newsdesk_types::{Article, Result};

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Store `articles` and return where they went and how many were written.
    async fn write_batch(&self, articles: &[Article]) -> Result<(String, usize)>;
}

/// Writes each batch to a new `legal_news_materials_<UTC timestamp>.jsonl`
/// file in `dir`, one article per line.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(now: chrono::DateTime<Utc>) -> String {
        format!("legal_news_materials_{}.jsonl", now.format("%Y%m%d%H%M%S"))
    }
}

#[async_trait]
impl PersistenceSink for JsonlSink {
    async fn write_batch(&self, articles: &[Article]) -> Result<(String, usize)> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(Utc::now()));

        let mut body = String::new();
        for article in articles {
            body.push_str(&serde_json::to_string(article)?);
            body.push('\n');
        }
        tokio::fs::write(&path, body).await?;

        let location = path.display().to_string();
        tracing::info!(path = %location, count = articles.len(), "Articles saved");
        Ok((location, articles.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use newsdesk_types::ItemId;
    use serde_json::json;

    fn article(id: u64) -> Article {
        Article {
            id: ItemId(id),
            headline: format!("Headline {id}"),
            news_article: json!({"title": "t", "body": "b"}),
            keywords: vec!["court".into()],
            keypoints: json!(["holding"]),
            why_newsworthy: "precedent".into(),
            source_url: "https://www.courtlistener.com/opinion/1/x/".into(),
            source_date_created: Some("2024-05-01T10:00:00Z".into()),
            source_date_modified: None,
            date_created: Utc::now(),
        }
    }

    #[test]
    fn file_name_uses_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 3, 7).unwrap();
        assert_eq!(
            JsonlSink::file_name(at),
            "legal_news_materials_20240517090307.jsonl"
        );
    }

    #[tokio::test]
    async fn writes_one_line_per_article() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("output"));
        let (location, count) = sink.write_batch(&[article(1), article(2)]).await.unwrap();
        assert_eq!(count, 2);

        let text = tokio::fs::read_to_string(&location).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Article = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.id, ItemId(1));
        assert_eq!(first.headline, "Headline 1");
    }

    #[tokio::test]
    async fn empty_batch_still_writes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path());
        let (location, count) = sink.write_batch(&[]).await.unwrap();
        assert_eq!(count, 0);
        assert!(Path::new(&location).exists());
    }
}
