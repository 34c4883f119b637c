//! Periodic rebuild of the fruit database from the crop listing page.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    Client as ReqwestClient, Method,
    header::{HeaderMap, HeaderValue},
};
use url::Url;

use super::{Fruit, FruitDatabase, parse_fruit_page};
use crate::Result;
use crate::error::Error;
use crate::feed::Refresh;

/// Public crop listing the database is scraped from.
pub const DEFAULT_FRUIT_URL: &str = "https://growagardenstock.com/crops";

/// Scrapes the crop listing and swaps the result into a [`FruitDatabase`].
#[derive(Clone, Debug)]
pub struct FruitRefresher {
    client: ReqwestClient,
    url: Url,
    database: Arc<FruitDatabase>,
}

impl FruitRefresher {
    /// # Errors
    ///
    /// Returns an error if `url` is invalid or the HTTP client cannot be created.
    pub fn new(url: &str, database: Arc<FruitDatabase>) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("garden_stock_feed"));
        headers.insert("Accept", HeaderValue::from_static("text/html"));
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            url: Url::parse(url)?,
            database,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn database(&self) -> &Arc<FruitDatabase> {
        &self.database
    }

    /// Download and parse the listing without touching the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the page is unreachable or answers with a non-success status.
    pub async fn fetch(&self) -> Result<Vec<Fruit>> {
        let request = self
            .client
            .request(Method::GET, self.url.clone())
            .build()?;

        let response = self.client.execute(request).await?;
        let status_code = response.status();

        if !status_code.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::status(
                status_code,
                Method::GET,
                self.url.path().to_owned(),
                message,
            ));
        }

        let html = response.text().await?;
        Ok(parse_fruit_page(&html, &self.url))
    }
}

#[async_trait]
impl Refresh for FruitRefresher {
    fn name(&self) -> &str {
        "fruit database"
    }

    /// An empty scrape usually means the page layout changed, so the previous data is kept.
    async fn refresh(&self) -> Result<()> {
        let fruits = self.fetch().await?;
        if fruits.is_empty() {
            return Err(Error::validation(format!(
                "no fruit cards found at {}",
                self.url
            )));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(fruits = fruits.len(), url = %self.url, "Scraped fruit listing");

        self.database.replace(fruits);
        self.database.persist().await
    }
}
