use crate::error::BotError;
use crate::services::ensure_success;
use reqwest::header::{REFERER, USER_AGENT};
use serde::Deserialize;
use url::Url;

const SEARCH_URL: &str = "https://ecshweb.pchome.com.tw/search/v3.3/all/results";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const RESULT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(rename = "picS", default)]
    pub pic_small: Option<String>,
    #[serde(rename = "picB", default)]
    pub pic_big: Option<String>,
}

impl Product {
    pub fn link(&self) -> String {
        format!("https://24h.pchome.com.tw/prod/{}", self.id)
    }

    pub fn image_url(&self) -> Option<String> {
        self.pic_small
            .as_deref()
            .or(self.pic_big.as_deref())
            .filter(|p| !p.is_empty())
            .map(|p| format!("https://cs-a.ecimg.tw{}", p))
    }

    /// Price with thousands separators, e.g. `NT$ 12,900`.
    pub fn price_label(&self) -> String {
        let digits = self.price.unsigned_abs().to_string();
        let mut grouped = String::new();
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.price < 0 { "-" } else { "" };
        format!("NT$ {}{}", sign, grouped)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    prods: Vec<Product>,
}

pub struct ShoppingService {
    client: reqwest::Client,
}

impl ShoppingService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn search(&self, keyword: &str) -> Result<Vec<Product>, BotError> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            [("q", keyword), ("page", "1"), ("sort", "rnk/dc")],
        )
        .map_err(|e| BotError::InvalidInput(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_UA)
            .header(REFERER, "https://24h.pchome.com.tw/")
            .send()
            .await?;
        let body = ensure_success("PChome", response)?.text().await?;
        parse_results(&body)
    }
}

pub fn parse_results(json: &str) -> Result<Vec<Product>, BotError> {
    let response: SearchResponse = serde_json::from_str(json)?;
    let mut products = response.prods;
    products.truncate(RESULT_LIMIT);
    Ok(products)
}
