//! Fruit reference database.
//!
//! **Feature flag:** `fruits`
//!
//! The database is scraped from a public crop listing, kept in memory for queries and
//! persisted as `{ "fruits": [...] }` so a restart has data before the first refresh.

pub mod refresher;
pub mod scrape;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

pub use refresher::{DEFAULT_FRUIT_URL, FruitRefresher};
pub use scrape::parse_fruit_page;

use crate::{Result, store};

/// One crop from the listing.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fruit {
    pub name: String,
    /// Absolute image URL
    pub image: String,
    pub rarity: String,
}

impl Fruit {
    #[must_use]
    pub fn new<N, I, R>(name: N, image: I, rarity: R) -> Self
    where
        N: Into<String>,
        I: Into<String>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            image: image.into(),
            rarity: rarity.into(),
        }
    }
}

/// On-disk layout of the database file.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FruitCatalog {
    pub fruits: Vec<Fruit>,
}

/// Query filters. Empty values are ignored.
///
/// `name` matches a case-insensitive substring, `rarity` a case-insensitive exact value.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FruitFilter {
    pub name: Option<String>,
    pub rarity: Option<String>,
}

impl FruitFilter {
    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_rarity<S: Into<String>>(mut self, rarity: S) -> Self {
        self.rarity = Some(rarity.into());
        self
    }

    #[must_use]
    pub fn matches(&self, fruit: &Fruit) -> bool {
        let name = self
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .is_none_or(|name| fruit.name.to_lowercase().contains(&name.to_lowercase()));

        let rarity = self
            .rarity
            .as_deref()
            .filter(|rarity| !rarity.is_empty())
            .is_none_or(|rarity| fruit.rarity.to_lowercase() == rarity.to_lowercase());

        name && rarity
    }
}

/// Fruits matching `filter`, in their original order.
#[must_use]
pub fn filter_fruits(fruits: &[Fruit], filter: &FruitFilter) -> Vec<Fruit> {
    fruits
        .iter()
        .filter(|fruit| filter.matches(fruit))
        .cloned()
        .collect()
}

/// In-memory fruit database, optionally backed by a JSON file.
#[derive(Debug)]
pub struct FruitDatabase {
    fruits: ArcSwapOption<Vec<Fruit>>,
    path: Option<PathBuf>,
}

impl Default for FruitDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl FruitDatabase {
    /// An empty database that is never persisted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fruits: ArcSwapOption::empty(),
            path: None,
        }
    }

    /// Open the database file at `path`. A missing file yields an empty database that will
    /// be written on the first successful refresh.
    pub async fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let catalog: Option<FruitCatalog> = store::read_json(&path).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %path.display(),
            fruits = catalog.as_ref().map(|catalog| catalog.fruits.len()),
            "Loaded fruit database"
        );

        Ok(Self {
            fruits: ArcSwapOption::new(catalog.map(|catalog| Arc::new(catalog.fruits))),
            path: Some(path),
        })
    }

    /// Swap in a freshly scraped list.
    pub fn replace(&self, fruits: Vec<Fruit>) {
        self.fruits.store(Some(Arc::new(fruits)));
    }

    /// Write the current list to the backing file, if there is one.
    pub async fn persist(&self) -> Result<()> {
        let (Some(path), Some(fruits)) = (self.path.as_deref(), self.fruits.load_full()) else {
            return Ok(());
        };

        let catalog = FruitCatalog {
            fruits: fruits.as_ref().clone(),
        };
        store::write_json(path, &catalog).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(path = %path.display(), fruits = catalog.fruits.len(), "Updated fruit database");

        Ok(())
    }

    /// All fruits, or `None` before the first load or refresh.
    #[must_use]
    pub fn fruits(&self) -> Option<Arc<Vec<Fruit>>> {
        self.fruits.load_full()
    }

    /// Fruits matching `filter`, or `None` when the database has no data.
    #[must_use]
    pub fn query(&self, filter: &FruitFilter) -> Option<Vec<Fruit>> {
        self.fruits()
            .map(|fruits| filter_fruits(&fruits, filter))
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
