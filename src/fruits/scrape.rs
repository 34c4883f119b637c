//! Extraction of fruit cards from the crop listing page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::Fruit;

/// Classes that identify the grid holding the fruit cards.
const GRID_CLASSES: [&str; 7] = [
    "grid",
    "grid-cols-1",
    "sm:grid-cols-2",
    "lg:grid-cols-3",
    "xl:grid-cols-4",
    "gap-4",
    "mb-16",
];

/// Classes that identify the rarity badge inside a card.
const RARITY_CLASSES: [&str; 6] = [
    "px-2",
    "py-1",
    "text-xs",
    "font-medium",
    "rounded-full",
    "border",
];

static GRID: LazyLock<Selector> = LazyLock::new(|| selector("div.grid"));
static CARD: LazyLock<Selector> = LazyLock::new(|| selector("div.bg-white"));
static NAME: LazyLock<Selector> = LazyLock::new(|| selector("h3"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static BADGE: LazyLock<Selector> = LazyLock::new(|| selector("span"));

#[expect(
    clippy::expect_used,
    reason = "Selectors are string literals checked by the tests below"
)]
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector should parse")
}

/// Pull every fruit card out of `html`. Image paths are resolved against `page`.
///
/// Cards without a name are skipped; a missing image or rarity becomes an empty string.
#[must_use]
pub fn parse_fruit_page(html: &str, page: &Url) -> Vec<Fruit> {
    let document = Html::parse_document(html);

    document
        .select(&GRID)
        .filter(|grid| has_classes(*grid, &GRID_CLASSES))
        .flat_map(|grid| grid.select(&CARD))
        .filter_map(|card| parse_card(card, page))
        .collect()
}

fn parse_card(card: ElementRef<'_>, page: &Url) -> Option<Fruit> {
    let name = card.select(&NAME).next().map(text)?;
    if name.is_empty() {
        return None;
    }

    let image = card
        .select(&IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| page.join(src).ok())
        .map(String::from)
        .unwrap_or_default();

    let rarity = card
        .select(&BADGE)
        .filter(|span| has_classes(*span, &RARITY_CLASSES))
        .last()
        .map(text)
        .unwrap_or_default();

    Some(Fruit {
        name,
        image,
        rarity,
    })
}

fn has_classes(element: ElementRef<'_>, required: &[&str]) -> bool {
    let classes: Vec<&str> = element.value().classes().collect();
    required.iter().all(|class| classes.contains(class))
}

fn text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}
