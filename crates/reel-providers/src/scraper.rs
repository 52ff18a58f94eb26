//! HTML product listing scraper.
//!
//! Reads OpenGraph and `product:` meta tags, the `<title>` element and
//! JSON-LD `Product` blocks. Meta tags win over JSON-LD, which wins over
//! the document title.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reel_models::ProductSnapshot;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::build_client;
use crate::traits::ProductScraper;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static JSON_LD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .unwrap()
});

/// Scrapes product listings over HTTP.
pub struct HtmlScraper {
    client: Client,
}

impl HtmlScraper {
    pub fn new(config: &ScraperConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(config.timeout, Some(&config.user_agent))?,
        })
    }

    async fn fetch(&self, url: &Url) -> ProviderResult<String> {
        let response = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await?;

        let status = response.status();
        match status {
            s if s.is_success() => Ok(response.text().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::permanent(
                format!("source blocked the scraper (HTTP {})", status.as_u16()),
            )),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(ProviderError::permanent(format!(
                "source page not found (HTTP {})",
                status.as_u16()
            ))),
            _ => Err(ProviderError::from_http_status(
                status.as_u16(),
                format!("fetching {url}"),
            )),
        }
    }
}

#[async_trait]
impl ProductScraper for HtmlScraper {
    async fn scrape(&self, source_url: &str) -> ProviderResult<ProductSnapshot> {
        let url = parse_source_url(source_url)?;
        info!(url = %url, "Scraping product listing");

        let html = self.fetch(&url).await?;
        let snapshot = extract_product(&html, &url)?;

        debug!(
            title = %snapshot.title,
            images = snapshot.images.len(),
            "Scraped product"
        );
        Ok(snapshot)
    }
}

/// Accept only absolute http(s) URLs.
pub fn parse_source_url(source_url: &str) -> ProviderResult<Url> {
    let url = Url::parse(source_url.trim())
        .map_err(|e| ProviderError::validation(format!("invalid source URL: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(ProviderError::validation(format!(
            "unsupported source URL scheme: {scheme}"
        ))),
    }
}

/// Build a normalized snapshot from listing HTML.
pub fn extract_product(html: &str, page_url: &Url) -> ProviderResult<ProductSnapshot> {
    let meta = MetaTags::parse(html);
    let ld = json_ld_product(html);

    let title = meta
        .first(&["og:title", "twitter:title"])
        .or_else(|| ld.as_ref().and_then(|p| str_field(p, "name")))
        .or_else(|| {
            TITLE_TAG
                .captures(html)
                .and_then(|c| c.get(1))
                .map(|m| decode_entities(m.as_str()))
        })
        .unwrap_or_default();

    let description = meta
        .first(&["og:description", "description", "twitter:description"])
        .or_else(|| ld.as_ref().and_then(|p| str_field(p, "description")))
        .unwrap_or_default();

    let price = meta_price(&meta).or_else(|| ld.as_ref().and_then(ld_price));

    let mut images = meta.all(&["og:image", "og:image:url", "og:image:secure_url", "twitter:image"]);
    if let Some(product) = &ld {
        images.extend(ld_images(product));
    }

    let raw = ProductSnapshot {
        title,
        price,
        description,
        images,
    };

    raw.normalized(Some(page_url))
        .map_err(|_| ProviderError::validation("listing has no product title"))
}

struct MetaTags(Vec<(String, String)>);

impl MetaTags {
    fn parse(html: &str) -> Self {
        let mut tags = Vec::new();
        for tag in META_TAG.find_iter(html) {
            let mut key = None;
            let mut content = None;
            for cap in ATTR.captures_iter(tag.as_str()) {
                let name = cap[1].to_ascii_lowercase();
                let value = cap
                    .get(2)
                    .or_else(|| cap.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match name.as_str() {
                    "property" | "name" | "itemprop" if key.is_none() => {
                        key = Some(value.to_ascii_lowercase())
                    }
                    "content" => content = Some(decode_entities(value)),
                    _ => {}
                }
            }
            if let (Some(k), Some(c)) = (key, content) {
                tags.push((k, c));
            }
        }
        Self(tags)
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| {
            self.0
                .iter()
                .find(|(k, v)| k == key && !v.trim().is_empty())
                .map(|(_, v)| v.clone())
        })
    }

    fn all(&self, keys: &[&str]) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .map(|(_, v)| v.clone())
            .collect()
    }
}

fn meta_price(meta: &MetaTags) -> Option<String> {
    let amount = meta.first(&["product:price:amount", "og:price:amount"])?;
    match meta.first(&["product:price:currency", "og:price:currency"]) {
        Some(currency) => Some(format!("{amount} {currency}")),
        None => Some(amount),
    }
}

fn json_ld_product(html: &str) -> Option<Value> {
    JSON_LD
        .captures_iter(html)
        .filter_map(|c| serde_json::from_str::<Value>(c[1].trim()).ok())
        .find_map(find_product)
}

fn find_product(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().find_map(find_product),
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(t)) => t == "Product",
                Some(Value::Array(types)) => types.iter().any(|t| t == "Product"),
                _ => false,
            };
            if is_product {
                return Some(Value::Object(map));
            }
            map.get("@graph").cloned().and_then(find_product)
        }
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(decode_entities)
}

fn ld_images(product: &Value) -> Vec<String> {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Value::Object(map) => {
                if let Some(Value::String(url)) = map.get("url").or_else(|| map.get("contentUrl")) {
                    out.push(url.clone());
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    if let Some(image) = product.get("image") {
        collect(image, &mut out);
    }
    out
}

fn ld_price(product: &Value) -> Option<String> {
    let offers = product.get("offers")?;
    let offer = match offers {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let amount = match offer.get("price").or_else(|| offer.get("lowPrice"))? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    match offer.get("priceCurrency").and_then(Value::as_str) {
        Some(currency) => Some(format!("{amount} {currency}")),
        None => Some(amount),
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OG_PAGE: &str = r#"<html><head>
        <title>Ignored | Shop</title>
        <meta property="og:title" content="Trail Runner &amp; Co" />
        <meta name="description" content="Light and   fast." >
        <meta property="og:image" content="/img/a.jpg">
        <meta property="og:image" content="https://cdn.shop.test/b.jpg">
        <meta property="product:price:amount" content="89.00">
        <meta property="product:price:currency" content="USD">
        </head><body></body></html>"#;

    const LD_PAGE: &str = r#"<html><head><title>Fallback title</title>
        <script type="application/ld+json">
        {"@context":"https://schema.org","@graph":[{"@type":"WebSite"},
          {"@type":"Product","name":"Desk Lamp","description":"Warm light",
           "image":["https://cdn.shop.test/lamp.jpg",{"url":"https://cdn.shop.test/lamp2.jpg"}],
           "offers":{"@type":"Offer","price":42.5,"priceCurrency":"EUR"}}]}
        </script></head></html>"#;

    fn page() -> Url {
        Url::parse("https://shop.test/p/shoe").unwrap()
    }

    #[test]
    fn test_extracts_open_graph() {
        let snap = extract_product(OG_PAGE, &page()).unwrap();
        assert_eq!(snap.title, "Trail Runner & Co");
        assert_eq!(snap.description, "Light and fast.");
        assert_eq!(snap.price.as_deref(), Some("89.00 USD"));
        assert_eq!(
            snap.images,
            vec!["https://shop.test/img/a.jpg", "https://cdn.shop.test/b.jpg"]
        );
    }

    #[test]
    fn test_extracts_json_ld_product() {
        let snap = extract_product(LD_PAGE, &page()).unwrap();
        assert_eq!(snap.title, "Desk Lamp");
        assert_eq!(snap.description, "Warm light");
        assert_eq!(snap.price.as_deref(), Some("42.5 EUR"));
        assert_eq!(snap.images.len(), 2);
    }

    #[test]
    fn test_falls_back_to_title_tag() {
        let html = "<html><head><title> Plain  Page </title></head></html>";
        let snap = extract_product(html, &page()).unwrap();
        assert_eq!(snap.title, "Plain Page");
        assert!(snap.images.is_empty());
    }

    #[test]
    fn test_missing_title_is_validation_error() {
        let err = extract_product("<html><body>nothing</body></html>", &page()).unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Validation);
    }

    #[test]
    fn test_rejects_bad_source_urls() {
        assert!(parse_source_url("ftp://shop.test/x").is_err());
        assert!(parse_source_url("not a url").is_err());
        assert!(parse_source_url("https://shop.test/p/1").is_ok());
    }

    #[tokio::test]
    async fn test_scrape_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p/shoe"))
            .respond_with(ResponseTemplate::new(200).set_body_string(OG_PAGE))
            .mount(&server)
            .await;

        let scraper = HtmlScraper::new(&ScraperConfig::default()).unwrap();
        let snap = scraper
            .scrape(&format!("{}/p/shoe", server.uri()))
            .await
            .unwrap();
        assert_eq!(snap.title, "Trail Runner & Co");
        assert_eq!(snap.primary_image(), Some(format!("{}/img/a.jpg", server.uri()).as_str()));
    }

    #[tokio::test]
    async fn test_scrape_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let scraper = HtmlScraper::new(&ScraperConfig::default()).unwrap();
        let blocked = scraper.scrape(&format!("{}/blocked", server.uri())).await.unwrap_err();
        assert_eq!(blocked.kind(), ProviderErrorKind::Permanent);
        let busy = scraper.scrape(&format!("{}/busy", server.uri())).await.unwrap_err();
        assert!(busy.is_retryable());
        let gone = scraper.scrape(&format!("{}/gone", server.uri())).await.unwrap_err();
        assert_eq!(gone.kind(), ProviderErrorKind::Permanent);
    }
}
