//! Normalized product snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Product data captured from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProductSnapshot {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Absolute http(s) image URLs, first one is the primary preview.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductSnapshot {
    /// Normalize raw scraped fields.
    ///
    /// Collapses whitespace, drops empty prices, resolves relative image
    /// URLs against `page_url` and removes duplicates and non-http(s) links.
    /// A snapshot without a title is rejected.
    pub fn normalized(self, page_url: Option<&Url>) -> ModelResult<Self> {
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return Err(ModelError::validation("product title is empty"));
        }

        let price = self
            .price
            .map(|p| collapse_whitespace(&p))
            .filter(|p| !p.is_empty());

        let mut images: Vec<String> = Vec::with_capacity(self.images.len());
        for raw in &self.images {
            let Some(resolved) = resolve_image(raw.trim(), page_url) else {
                continue;
            };
            if !images.contains(&resolved) {
                images.push(resolved);
            }
        }

        Ok(Self {
            title,
            price,
            description: collapse_whitespace(&self.description),
            images,
        })
    }

    /// First image, used as the job's preview (`product_url`).
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Image for scene `index`, cycling through the available images.
    pub fn image_for_scene(&self, index: usize) -> Option<&str> {
        if self.images.is_empty() {
            return None;
        }
        Some(self.images[index % self.images.len()].as_str())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_image(raw: &str, base: Option<&Url>) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let parsed = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    match parsed.scheme() {
        "http" | "https" => Some(parsed.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(images: &[&str]) -> ProductSnapshot {
        ProductSnapshot {
            title: "  Trail   Runner\n Shoe ".to_string(),
            price: Some("  $89.00 ".to_string()),
            description: "Light,\tfast\n\nand grippy.".to_string(),
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalizes_text_fields() {
        let snap = raw(&[]).normalized(None).unwrap();
        assert_eq!(snap.title, "Trail Runner Shoe");
        assert_eq!(snap.price.as_deref(), Some("$89.00"));
        assert_eq!(snap.description, "Light, fast and grippy.");
    }

    #[test]
    fn test_resolves_and_dedupes_images() {
        let base = Url::parse("https://shop.example.com/p/shoe").unwrap();
        let snap = raw(&[
            "/img/a.jpg",
            "https://shop.example.com/img/a.jpg",
            "data:image/png;base64,AAAA",
            "",
            "//cdn.example.com/b.jpg",
        ])
        .normalized(Some(&base))
        .unwrap();

        assert_eq!(
            snap.images,
            vec![
                "https://shop.example.com/img/a.jpg".to_string(),
                "https://cdn.example.com/b.jpg".to_string(),
            ]
        );
        assert_eq!(snap.primary_image(), Some("https://shop.example.com/img/a.jpg"));
    }

    #[test]
    fn test_missing_title_rejected() {
        let mut snap = raw(&[]);
        snap.title = "   ".to_string();
        assert!(matches!(snap.normalized(None), Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_empty_price_dropped() {
        let mut snap = raw(&[]);
        snap.price = Some("  ".to_string());
        assert_eq!(snap.normalized(None).unwrap().price, None);
    }

    #[test]
    fn test_image_for_scene_round_robin() {
        let snap = ProductSnapshot {
            title: "x".into(),
            images: vec!["https://a/1.jpg".into(), "https://a/2.jpg".into()],
            ..Default::default()
        };
        assert_eq!(snap.image_for_scene(0), Some("https://a/1.jpg"));
        assert_eq!(snap.image_for_scene(3), Some("https://a/2.jpg"));
        assert_eq!(ProductSnapshot::default().image_for_scene(0), None);
    }
}
