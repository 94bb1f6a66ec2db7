//! Paginated client for a category-organized media metadata API
//! (MediaWiki-style continuation tokens).
//!
//! Transport failures are non-fatal by design: a query returns whatever was
//! collected plus an outcome that tells "limit reached" apart from "no more
//! data" and "remote gave up", so callers can choose a retry policy.

use crate::record::ImageRecord;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::thread;
use std::time::Duration;

/// Default endpoint for the category metadata API.
pub const DEFAULT_API_URL: &str = "https://commons.wikimedia.org/w/api.php";

/// Maximum members requested per page, regardless of the overall limit.
pub const PAGE_SIZE: usize = 50;

/// Fixed delay between paginated requests; a deliberate rate-limit throttle.
pub const PAGE_DELAY: Duration = Duration::from_millis(300);

/// Bound on every request issued by the client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifying client header sent with every request.
pub const USER_AGENT: &str = concat!(
    "portra/",
    env!("CARGO_PKG_VERSION"),
    " (face recognition test-set curation)"
);

/// Width hint for the pre-scaled thumbnail URLs the API returns.
const THUMB_WIDTH: &str = "800";

/// Builds the blocking HTTP client shared by the category client and the
/// download cache.
pub fn build_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// How a member query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The requested limit was reached.
    Complete,
    /// The API reported no further pages before the limit was reached.
    Exhausted,
    /// A request failed; the records collected before the failure are kept.
    Failed(String),
}

/// Result of a member query: the collected records and how collection ended.
#[derive(Debug)]
pub struct MemberQuery {
    pub records: Vec<ImageRecord>,
    pub outcome: QueryOutcome,
}

pub struct CategoryClient {
    http: reqwest::blocking::Client,
    api_url: String,
}

impl CategoryClient {
    pub fn new(http: reqwest::blocking::Client) -> Self {
        Self {
            http,
            api_url: DEFAULT_API_URL.to_owned(),
        }
    }

    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    /// Fetches up to `limit` file members of a category, paging with the
    /// continuation token and sleeping between pages.
    pub fn fetch_category_members(&self, category: &str, limit: usize) -> MemberQuery {
        let mut records = Vec::new();
        let mut continue_token: Option<String> = None;

        while records.len() < limit {
            let payload =
                match self.request_members_page(category, limit, continue_token.as_deref()) {
                    Ok(payload) => payload,
                    Err(error) => {
                        return MemberQuery {
                            records,
                            outcome: QueryOutcome::Failed(error.to_string()),
                        }
                    }
                };

            match parse_member_pages(&payload) {
                Some(mut page_records) => records.append(&mut page_records),
                None => {
                    return MemberQuery {
                        records,
                        outcome: QueryOutcome::Exhausted,
                    }
                }
            }

            match parse_continue_token(&payload) {
                Some(token) => {
                    continue_token = Some(token);
                    thread::sleep(PAGE_DELAY);
                }
                None => {
                    return MemberQuery {
                        records,
                        outcome: QueryOutcome::Exhausted,
                    }
                }
            }
        }

        MemberQuery {
            records,
            outcome: QueryOutcome::Complete,
        }
    }

    /// Lists subcategory names of a category, one page of up to 50, with the
    /// `Category:` prefix stripped.
    pub fn fetch_subcategories(&self, category: &str) -> Result<Vec<String>, CategoryError> {
        let title = format!("Category:{}", category);
        let params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("format", "json"),
            ("list", "categorymembers"),
            ("cmtitle", &title),
            ("cmtype", "subcat"),
            ("cmlimit", "50"),
        ];

        let payload: Value = self
            .http
            .get(&self.api_url)
            .query(&params)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(CategoryError::Http)?
            .json()
            .map_err(CategoryError::Http)?;

        Ok(parse_subcategories(&payload))
    }

    fn request_members_page(
        &self,
        category: &str,
        limit: usize,
        continue_token: Option<&str>,
    ) -> Result<Value, reqwest::Error> {
        let title = format!("Category:{}", category);
        let page_size = limit.min(PAGE_SIZE).to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("action", "query"),
            ("format", "json"),
            ("generator", "categorymembers"),
            ("gcmtitle", &title),
            ("gcmtype", "file"),
            ("gcmlimit", &page_size),
            ("prop", "imageinfo"),
            ("iiprop", "url|size|extmetadata|timestamp"),
            ("iiurlwidth", THUMB_WIDTH),
        ];
        if let Some(token) = continue_token {
            params.push(("gcmcontinue", token));
        }

        self.http
            .get(&self.api_url)
            .query(&params)
            .send()
            .and_then(|response| response.error_for_status())?
            .json()
    }
}

/// Extracts image records from one member page. Returns `None` when the
/// payload carries no page map, which the client reads as "no more data".
/// Pages without image info are skipped.
pub fn parse_member_pages(payload: &Value) -> Option<Vec<ImageRecord>> {
    let pages = payload.get("query")?.get("pages")?.as_object()?;
    Some(pages.values().filter_map(parse_page).collect())
}

fn parse_page(page: &Value) -> Option<ImageRecord> {
    let info = page.get("imageinfo")?.as_array()?.first()?;
    Some(ImageRecord {
        title: page
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_owned(),
        page_id: page.get("pageid").and_then(Value::as_u64).unwrap_or(0),
        url: info
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        thumb_url: info
            .get("thumburl")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        width: info.get("width").and_then(Value::as_u64).unwrap_or(800) as u32,
        height: info.get("height").and_then(Value::as_u64).unwrap_or(600) as u32,
        thumb_width: info
            .get("thumbwidth")
            .and_then(Value::as_u64)
            .map(|width| width as u32),
        thumb_height: info
            .get("thumbheight")
            .and_then(Value::as_u64)
            .map(|height| height as u32),
        timestamp: info
            .get("timestamp")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        metadata: parse_extmetadata(info.get("extmetadata")),
    })
}

fn parse_extmetadata(extmetadata: Option<&Value>) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    let Some(entries) = extmetadata.and_then(Value::as_object) else {
        return metadata;
    };
    for (key, entry) in entries {
        let Some(value) = entry.get("value") else {
            continue;
        };
        let text = match value.as_str() {
            Some(text) => text.to_owned(),
            None => value.to_string(),
        };
        metadata.insert(key.clone(), text);
    }
    metadata
}

/// Continuation token for the next member page, when the API offers one.
pub fn parse_continue_token(payload: &Value) -> Option<String> {
    payload
        .get("continue")?
        .get("gcmcontinue")?
        .as_str()
        .map(ToOwned::to_owned)
}

/// Extracts subcategory names, stripping the `Category:` prefix.
pub fn parse_subcategories(payload: &Value) -> Vec<String> {
    let Some(members) = payload
        .get("query")
        .and_then(|query| query.get("categorymembers"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    members
        .iter()
        .filter_map(|member| member.get("title").and_then(Value::as_str))
        .map(|title| title.strip_prefix("Category:").unwrap_or(title).to_owned())
        .collect()
}

#[derive(Debug)]
pub enum CategoryError {
    Http(reqwest::Error),
}

impl Display for CategoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(error) => write!(f, "category request failed: {}", error),
        }
    }
}

impl Error for CategoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(error) => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_member_pages_with_image_info() {
        let payload = json!({
            "query": {
                "pages": {
                    "101": {
                        "pageid": 101,
                        "title": "File:Portrait 1989.jpg",
                        "imageinfo": [{
                            "url": "https://example.org/full.jpg",
                            "thumburl": "https://example.org/thumb.jpg",
                            "width": 3000,
                            "height": 2000,
                            "thumbwidth": 800,
                            "thumbheight": 533,
                            "timestamp": "2019-03-01T12:00:00Z",
                            "extmetadata": {
                                "LicenseShortName": {"value": "Public Domain"},
                                "Copyrighted": {"value": false}
                            }
                        }]
                    },
                    "102": {
                        "pageid": 102,
                        "title": "File:No info.jpg"
                    }
                }
            }
        });

        let records = parse_member_pages(&payload).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "File:Portrait 1989.jpg");
        assert_eq!(record.page_id, 101);
        assert_eq!(record.thumb_url.as_deref(), Some("https://example.org/thumb.jpg"));
        assert_eq!(record.download_dimensions(), (800, 533));
        assert_eq!(record.metadata_value("LicenseShortName"), Some("Public Domain"));
        // Non-string metadata values are kept as JSON text.
        assert_eq!(record.metadata_value("Copyrighted"), Some("false"));
    }

    #[test]
    fn missing_page_map_means_no_more_data() {
        let payload = json!({"batchcomplete": ""});
        assert!(parse_member_pages(&payload).is_none());
    }

    #[test]
    fn continuation_token_is_extracted_when_present() {
        let payload = json!({"continue": {"gcmcontinue": "page|2|x"}});
        assert_eq!(parse_continue_token(&payload).as_deref(), Some("page|2|x"));

        let done = json!({"query": {"pages": {}}});
        assert_eq!(parse_continue_token(&done), None);
    }

    #[test]
    fn subcategory_titles_lose_their_prefix() {
        let payload = json!({
            "query": {
                "categorymembers": [
                    {"title": "Category:Donald Trump in 1988"},
                    {"title": "Category:Donald Trump in 2017"},
                    {"title": "Unprefixed"}
                ]
            }
        });
        let names = parse_subcategories(&payload);
        assert_eq!(
            names,
            vec!["Donald Trump in 1988", "Donald Trump in 2017", "Unprefixed"]
        );
        assert!(parse_subcategories(&json!({})).is_empty());
    }

    #[test]
    fn failed_request_returns_collected_records_and_reason() {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        // Unroutable endpoint: the first page request fails immediately.
        let client =
            CategoryClient::new(http).with_api_url("http://127.0.0.1:9/api.php".to_owned());
        let query = client.fetch_category_members("Anything", 10);
        assert!(query.records.is_empty());
        assert!(matches!(query.outcome, QueryOutcome::Failed(_)));
    }
}
