#![cfg(feature = "fruits")]
#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

use std::sync::Arc;

use garden_stock_feed::error::{Kind, Status, StatusCode};
use garden_stock_feed::feed::Refresh as _;
use garden_stock_feed::fruits::{Fruit, FruitDatabase, FruitRefresher};
use httpmock::{Method::GET, MockServer};

const CROPS_PAGE: &str = r#"
<!doctype html>
<html>
  <body>
    <main>
      <div class="grid grid-cols-1 sm:grid-cols-2 lg:grid-cols-3 xl:grid-cols-4 gap-4 mb-16">
        <div class="bg-white rounded-xl shadow">
          <img src="/images/crops/apple.webp" alt="Apple">
          <h3 class="font-bold">Apple</h3>
          <span class="px-2 py-1 text-xs font-medium rounded-full border border-gray-300">Common</span>
        </div>
        <div class="bg-white rounded-xl shadow">
          <img src="https://cdn.growagardenstock.com/moon-melon.webp" alt="Moon Melon">
          <h3 class="font-bold">Moon Melon</h3>
          <span class="px-2 py-1 text-xs font-medium rounded-full border">Multi Harvest</span>
          <span class="px-2 py-1 text-xs font-medium rounded-full border border-purple-300">Mythical</span>
        </div>
      </div>
    </main>
  </body>
</html>
"#;

fn crops_url(server: &MockServer) -> String {
    format!("{}/crops", server.base_url())
}

#[tokio::test]
async fn fetch_should_succeed() -> anyhow::Result<()> {
    let server = MockServer::start();
    let database = Arc::new(FruitDatabase::new());
    let refresher = FruitRefresher::new(&crops_url(&server), database)?;

    let mock = server.mock(|when, then| {
        when.method(GET).path("/crops");
        then.status(StatusCode::OK)
            .header("content-type", "text/html")
            .body(CROPS_PAGE);
    });

    let fruits = refresher.fetch().await?;

    mock.assert();
    assert_eq!(
        fruits,
        vec![
            Fruit::new(
                "Apple",
                format!("{}/images/crops/apple.webp", server.base_url()),
                "Common"
            ),
            Fruit::new(
                "Moon Melon",
                "https://cdn.growagardenstock.com/moon-melon.webp",
                "Mythical"
            ),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn refresh_should_replace_and_persist() -> anyhow::Result<()> {
    let server = MockServer::start();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("data").join("fruitDatabase.json");
    let database = Arc::new(FruitDatabase::load(&path).await?);
    let refresher = FruitRefresher::new(&crops_url(&server), Arc::clone(&database))?;

    server.mock(|when, then| {
        when.method(GET).path("/crops");
        then.status(StatusCode::OK).body(CROPS_PAGE);
    });

    refresher.refresh().await?;

    assert_eq!(database.fruits().map(|fruits| fruits.len()), Some(2));

    let reloaded = FruitDatabase::load(&path).await?;
    assert_eq!(reloaded.fruits(), database.fruits());
    Ok(())
}

#[tokio::test]
async fn empty_page_should_keep_previous_fruits() -> anyhow::Result<()> {
    let server = MockServer::start();
    let database = Arc::new(FruitDatabase::new());
    database.replace(vec![Fruit::new("Apple", "", "Common")]);
    let refresher = FruitRefresher::new(&crops_url(&server), Arc::clone(&database))?;

    server.mock(|when, then| {
        when.method(GET).path("/crops");
        then.status(StatusCode::OK).body("<html><body>Down for maintenance</body></html>");
    });

    let error = refresher.refresh().await.unwrap_err();

    assert_eq!(error.kind(), Kind::Validation);
    assert_eq!(database.fruits().map(|fruits| fruits.len()), Some(1));
    Ok(())
}

#[tokio::test]
async fn error_status_should_fail() -> anyhow::Result<()> {
    let server = MockServer::start();
    let database = Arc::new(FruitDatabase::new());
    let refresher = FruitRefresher::new(&crops_url(&server), Arc::clone(&database))?;

    let mock = server.mock(|when, then| {
        when.method(GET).path("/crops");
        then.status(StatusCode::SERVICE_UNAVAILABLE).body("try again later");
    });

    let error = refresher.refresh().await.unwrap_err();

    mock.assert();
    assert_eq!(error.kind(), Kind::Status);
    let status = error.downcast_ref::<Status>().unwrap();
    assert_eq!(status.status_code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(status.path, "/crops");
    assert_eq!(status.message, "try again later");
    assert_eq!(database.fruits(), None);
    Ok(())
}
