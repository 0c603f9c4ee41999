//! JSON-LD structured data builders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const SCHEMA_CONTEXT: &str = "https://schema.org";

/// Types that satisfy the site-level identity check
pub const SITE_SCHEMA_TYPES: [&str; 2] = ["Organization", "WebSite"];
/// Types that satisfy the per-post article check
pub const ARTICLE_SCHEMA_TYPES: [&str; 3] = ["Article", "BlogPosting", "NewsArticle"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SchemaMarkup {
    Organization {
        name: String,
        url: String,
        logo: Option<String>,
        #[serde(default)]
        same_as: Vec<String>,
    },
    WebSite {
        name: String,
        url: String,
        /// Search URL template containing `{search_term_string}`
        search_url: Option<String>,
    },
    BlogPosting {
        headline: String,
        description: Option<String>,
        url: String,
        date_published: String,
        author: Option<String>,
        image: Option<String>,
    },
    Article {
        headline: String,
        description: Option<String>,
        url: String,
        date_published: String,
        author: Option<String>,
        image: Option<String>,
    },
    BreadcrumbList {
        domain: String,
        path: String,
    },
    Product {
        name: String,
        description: Option<String>,
        image: Option<String>,
        price: Option<String>,
        currency: Option<String>,
    },
    FaqPage {
        entries: Vec<FaqEntry>,
    },
    LocalBusiness {
        name: String,
        url: String,
        telephone: Option<String>,
        address: Option<String>,
    },
    HowTo {
        name: String,
        steps: Vec<String>,
    },
}

impl SchemaMarkup {
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaMarkup::Organization { .. } => "Organization",
            SchemaMarkup::WebSite { .. } => "WebSite",
            SchemaMarkup::BlogPosting { .. } => "BlogPosting",
            SchemaMarkup::Article { .. } => "Article",
            SchemaMarkup::BreadcrumbList { .. } => "BreadcrumbList",
            SchemaMarkup::Product { .. } => "Product",
            SchemaMarkup::FaqPage { .. } => "FAQPage",
            SchemaMarkup::LocalBusiness { .. } => "LocalBusiness",
            SchemaMarkup::HowTo { .. } => "HowTo",
        }
    }

    pub fn to_json_ld(&self) -> Value {
        let mut object = Map::new();
        object.insert("@context".into(), json!(SCHEMA_CONTEXT));
        object.insert("@type".into(), json!(self.type_name()));

        match self {
            SchemaMarkup::Organization {
                name,
                url,
                logo,
                same_as,
            } => {
                object.insert("name".into(), json!(name));
                object.insert("url".into(), json!(url));
                insert_opt(&mut object, "logo", logo);
                if !same_as.is_empty() {
                    object.insert("sameAs".into(), json!(same_as));
                }
            }
            SchemaMarkup::WebSite {
                name,
                url,
                search_url,
            } => {
                object.insert("name".into(), json!(name));
                object.insert("url".into(), json!(url));
                if let Some(target) = search_url {
                    object.insert(
                        "potentialAction".into(),
                        json!({
                            "@type": "SearchAction",
                            "target": target,
                            "query-input": "required name=search_term_string",
                        }),
                    );
                }
            }
            SchemaMarkup::BlogPosting {
                headline,
                description,
                url,
                date_published,
                author,
                image,
            }
            | SchemaMarkup::Article {
                headline,
                description,
                url,
                date_published,
                author,
                image,
            } => {
                object.insert("headline".into(), json!(headline));
                insert_opt(&mut object, "description", description);
                object.insert("url".into(), json!(url));
                object.insert("datePublished".into(), json!(date_published));
                if let Some(author) = author {
                    object.insert("author".into(), json!({ "@type": "Person", "name": author }));
                }
                insert_opt(&mut object, "image", image);
            }
            SchemaMarkup::BreadcrumbList { domain, path } => {
                object.insert("itemListElement".into(), Value::Array(breadcrumb_items(domain, path)));
            }
            SchemaMarkup::Product {
                name,
                description,
                image,
                price,
                currency,
            } => {
                object.insert("name".into(), json!(name));
                insert_opt(&mut object, "description", description);
                insert_opt(&mut object, "image", image);
                if let Some(price) = price {
                    object.insert(
                        "offers".into(),
                        json!({
                            "@type": "Offer",
                            "price": price,
                            "priceCurrency": currency.as_deref().unwrap_or("USD"),
                        }),
                    );
                }
            }
            SchemaMarkup::FaqPage { entries } => {
                let questions: Vec<Value> = entries
                    .iter()
                    .map(|entry| {
                        json!({
                            "@type": "Question",
                            "name": entry.question,
                            "acceptedAnswer": { "@type": "Answer", "text": entry.answer },
                        })
                    })
                    .collect();
                object.insert("mainEntity".into(), Value::Array(questions));
            }
            SchemaMarkup::LocalBusiness {
                name,
                url,
                telephone,
                address,
            } => {
                object.insert("name".into(), json!(name));
                object.insert("url".into(), json!(url));
                insert_opt(&mut object, "telephone", telephone);
                insert_opt(&mut object, "address", address);
            }
            SchemaMarkup::HowTo { name, steps } => {
                object.insert("name".into(), json!(name));
                let steps: Vec<Value> = steps
                    .iter()
                    .enumerate()
                    .map(|(i, text)| json!({ "@type": "HowToStep", "position": i + 1, "text": text }))
                    .collect();
                object.insert("step".into(), Value::Array(steps));
            }
        }

        Value::Object(object)
    }
}

fn insert_opt(object: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        object.insert(key.to_string(), json!(value));
    }
}

fn title_case(segment: &str) -> String {
    segment
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn breadcrumb_items(domain: &str, path: &str) -> Vec<Value> {
    let domain = domain.trim_end_matches('/');
    let mut items = vec![json!({
        "@type": "ListItem",
        "position": 1,
        "name": "Home",
        "item": format!("{}/", domain),
    })];

    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        items.push(json!({
            "@type": "ListItem",
            "position": items.len() + 1,
            "name": title_case(segment),
            "item": format!("{}{}", domain, current),
        }));
    }
    items
}

/// Literal `<script type="application/ld+json">` block
pub fn script_tag(value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    format!(
        "<script type=\"application/ld+json\">\n{}\n</script>",
        body.replace("</", "<\\/")
    )
}

/// Pretty JSON for embedding in JS/TS source
pub fn json_literal(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_json_ld() {
        let value = SchemaMarkup::Organization {
            name: "Acme".into(),
            url: "https://acme.dev".into(),
            logo: None,
            same_as: vec!["https://x.com/acme".into()],
        }
        .to_json_ld();
        assert_eq!(value["@context"], "https://schema.org");
        assert_eq!(value["@type"], "Organization");
        assert_eq!(value["sameAs"][0], "https://x.com/acme");
        assert!(value.get("logo").is_none());
    }

    #[test]
    fn test_breadcrumbs_from_path() {
        let value = SchemaMarkup::BreadcrumbList {
            domain: "https://acme.dev/".into(),
            path: "/blog/getting-started".into(),
        }
        .to_json_ld();
        let items = value["itemListElement"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1]["name"], "Blog");
        assert_eq!(items[2]["name"], "Getting Started");
        assert_eq!(items[2]["position"], 3);
        assert_eq!(items[2]["item"], "https://acme.dev/blog/getting-started");
    }

    #[test]
    fn test_script_tag_escapes_closing_tags() {
        let value = json!({ "@type": "Thing", "name": "</script>" });
        let tag = script_tag(&value);
        assert!(tag.starts_with("<script type=\"application/ld+json\">"));
        assert_eq!(tag.matches("</script>").count(), 1);
    }
}
