//! JSON Lines news reader.
//!
//! One `NewsItem` object per line; blank lines and `#` comments are skipped.
//! Records sharing a url collapse into the first one seen, with ticker lists
//! merged.

use crate::domain::error::StockotterError;
use crate::domain::news::NewsItem;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub fn read_news_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<NewsItem>, StockotterError> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_news_jsonl(&content)
}

pub fn parse_news_jsonl(content: &str) -> Result<Vec<NewsItem>, StockotterError> {
    let mut items: Vec<NewsItem> = Vec::new();
    let mut index_by_url: HashMap<String, usize> = HashMap::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let item: NewsItem =
            serde_json::from_str(trimmed).map_err(|e| StockotterError::NewsData {
                line: i + 1,
                reason: e.to_string(),
            })?;
        if item.id.trim().is_empty() {
            return Err(StockotterError::NewsData {
                line: i + 1,
                reason: "id must not be empty".into(),
            });
        }

        let url = if item.url.is_empty() {
            item.id.clone()
        } else {
            item.url.clone()
        };
        match index_by_url.get(&url) {
            Some(&existing) => merge_tickers(&mut items[existing], &item.tickers_mentioned),
            None => {
                index_by_url.insert(url, items.len());
                items.push(item);
            }
        }
    }

    Ok(items)
}

/// Appends tickers not already present, keeping first-seen order.
pub fn merge_tickers(item: &mut NewsItem, tickers: &[String]) {
    for ticker in tickers {
        if !item.tickers_mentioned.contains(ticker) {
            item.tickers_mentioned.push(ticker.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TWO_ITEMS: &str = r#"
{"id":"news-001","source":"naver","title":"삼성전자 반도체 투자 확대","url":"https://example.com/1","published_at":"2026-02-25T09:00:00+09:00","raw_text":"본문","tickers_mentioned":["005930"]}
# comment
{"id":"news-002","title":"SK하이닉스","url":"https://example.com/2","published_at":"2026-02-25T09:05:00+09:00"}
"#;

    #[test]
    fn parses_items_and_skips_blank_and_comment_lines() {
        let items = parse_news_jsonl(TWO_ITEMS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "news-001");
        assert_eq!(items[0].tickers_mentioned, vec!["005930"]);
        assert_eq!(items[1].source, "");
        assert!(items[1].tickers_mentioned.is_empty());
    }

    #[test]
    fn duplicate_urls_merge_tickers() {
        let content = concat!(
            r#"{"id":"a","title":"t","url":"u","published_at":"2026-02-25T09:00:00+09:00","tickers_mentioned":["005930"]}"#,
            "\n",
            r#"{"id":"b","title":"t","url":"u","published_at":"2026-02-25T09:01:00+09:00","tickers_mentioned":["000660","005930"]}"#,
        );
        let items = parse_news_jsonl(content).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a");
        assert_eq!(items[0].tickers_mentioned, vec!["005930", "000660"]);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let content = "\n{\"id\":\"a\"}\n";
        match parse_news_jsonl(content) {
            Err(StockotterError::NewsData { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected NewsData error, got: {other:?}"),
        }
    }

    #[test]
    fn empty_id_is_rejected() {
        let content = r#"{"id":" ","title":"t","published_at":"2026-02-25T09:00:00+09:00"}"#;
        assert!(matches!(
            parse_news_jsonl(content),
            Err(StockotterError::NewsData { line: 1, .. })
        ));
    }

    #[test]
    fn read_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TWO_ITEMS.as_bytes()).unwrap();
        let items = read_news_jsonl(file.path()).unwrap();
        assert_eq!(items.len(), 2);
    }
}
