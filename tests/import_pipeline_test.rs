// ==========================================
// Import pipeline integration tests
// ==========================================
// Full runs through AppState: fetch -> parse -> map -> match/write
// -> counters, history and catalog state.
// ==========================================


use chrono::Utc;
use feed_import::domain::feed::FieldMapping;
use feed_import::domain::import_run::ImportRun;
use feed_import::domain::product::CatalogProduct;
use feed_import::domain::target_schema::TargetField;
use feed_import::domain::types::{FeedFormat, ImportMode, LogLevel, MatchKey, RunStatus};
use feed_import::logging;
use feed_import::repository::ImportRunRepository;
use rust_decimal_macros::dec;
use test_helpers::*;

const CSV_URL: &str = "https://supplier.example.com/feed.csv";
const XML_URL: &str = "https://supplier.example.com/feed.xml";

#[tokio::test]
async fn test_csv_scenario() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(
        CSV_URL,
        csv_body(&[("111", "Widget", "9,99"), ("222", "Gadget", "abc")]),
    );
    let app = create_app(&db_path, fetcher.clone()).await;
    let feed = app.feed_api.create_feed(csv_feed(CSV_URL)).unwrap();

    let run = app.import_api.start_import(&feed.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();

    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.total, Some(2));
    assert_eq!(progress.counters.processed, 2);
    assert_eq!(progress.counters.created, 1);
    assert_eq!(progress.counters.updated, 0);
    assert_eq!(progress.counters.skipped, 0);
    assert_eq!(progress.counters.errors, 1);
    assert_eq!(progress.percent, Some(100.0));
    assert!(progress
        .logs
        .iter()
        .any(|l| l.level == LogLevel::Error && l.message.contains("cannot parse price 'abc'")));

    // history entry mirrors the final counters
    let history = app.import_api.get_import_history(&feed.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, run.id);
    assert_eq!(history[0].status, RunStatus::Completed);
    assert_eq!(history[0].counters, progress.counters);
    assert!(history[0].finished_at.is_some());
    assert!(history[0].error_message.is_none());

    // only the valid row reached the catalog
    let products = app.catalog.list_products().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].ean.as_deref(), Some("111"));
    assert_eq!(products[0].title.as_deref(), Some("Widget"));
    assert_eq!(products[0].price, Some(dec!(9.99)));
    assert_eq!(products[0].source_feed_id.as_deref(), Some(feed.id.as_str()));

    let feed = app.feed_api.get_feed(&feed.id).unwrap();
    assert!(feed.last_run_at.is_some());
    assert_eq!(feed.product_count, 1);
    assert_eq!(fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(CSV_URL, numbered_csv_body(4_000_000_000_000, 25));
    let app = create_app(&db_path, fetcher).await;
    let feed = app.feed_api.create_feed(csv_feed(CSV_URL)).unwrap();

    app.import_api.start_import(&feed.id).await.unwrap();
    let first = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(first.counters.created, 25);
    let after_first = catalog_values(&app.catalog);

    app.import_api.start_import(&feed.id).await.unwrap();
    let second = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.counters.created, 0);
    assert_eq!(second.counters.updated, 25);
    assert_eq!(second.counters.errors, 0);

    assert_eq!(catalog_values(&app.catalog), after_first);
    assert_eq!(app.catalog.count_products().unwrap(), 25);

    let history = app.import_api.get_import_history(&feed.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].counters.updated, 25, "newest run first");
    assert_eq!(app.feed_api.get_feed(&feed.id).unwrap().product_count, 25);
}

/// Runs a 5-record feed against a catalog already holding 2 of them.
async fn run_with_mode(mode: ImportMode) -> (feed_import::ImportProgress, Vec<CatalogProduct>) {
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(CSV_URL, numbered_csv_body(100, 5));
    let app = create_app(&db_path, fetcher).await;

    for ean in ["101", "103"] {
        app.catalog
            .insert_product(&CatalogProduct {
                id: format!("existing-{}", ean),
                ean: Some(ean.to_string()),
                title: Some("Seeded".to_string()),
                price: Some(dec!(1)),
                ..CatalogProduct::default()
            })
            .unwrap();
    }

    let mut config = csv_feed(CSV_URL);
    config.import_mode = mode;
    let feed = app.feed_api.create_feed(config).unwrap();
    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    (progress.as_ref().clone(), catalog_values(&app.catalog))
}

#[tokio::test]
async fn test_import_modes() {
    logging::init_test();

    let (progress, products) = run_with_mode(ImportMode::CreateOnly).await;
    assert_eq!((progress.counters.created, progress.counters.skipped), (3, 2));
    assert_eq!(progress.counters.updated, 0);
    assert_eq!(products.len(), 5);
    let seeded = products.iter().find(|p| p.ean.as_deref() == Some("101")).unwrap();
    assert_eq!(seeded.title.as_deref(), Some("Seeded"), "create_only never updates");

    let (progress, products) = run_with_mode(ImportMode::UpdateOnly).await;
    assert_eq!((progress.counters.updated, progress.counters.skipped), (2, 3));
    assert_eq!(progress.counters.created, 0);
    assert_eq!(products.len(), 2);
    assert!(progress
        .logs
        .iter()
        .any(|l| l.level == LogLevel::Info && l.message.contains("skipped")));

    let (progress, products) = run_with_mode(ImportMode::CreateUpdate).await;
    assert_eq!((progress.counters.created, progress.counters.updated), (3, 2));
    assert_eq!(progress.counters.skipped, 0);
    assert_eq!(products.len(), 5);
}

#[tokio::test]
async fn test_partial_update_keeps_unmapped_fields() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(CSV_URL, csv_body(&[("555", "Lamp", "49,90")]));
    let app = create_app(&db_path, fetcher).await;

    app.catalog
        .insert_product(&CatalogProduct {
            id: "p-555".to_string(),
            ean: Some("555".to_string()),
            title: Some("Old lamp".to_string()),
            description: Some("Hand-written description".to_string()),
            brand: Some("Lumen".to_string()),
            price: Some(dec!(59.90)),
            ..CatalogProduct::default()
        })
        .unwrap();

    let mut config = csv_feed(CSV_URL);
    config.import_mode = ImportMode::UpdateOnly;
    let feed = app.feed_api.create_feed(config).unwrap();
    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.counters.updated, 1);

    let product = app.catalog.get_product("p-555").unwrap().unwrap();
    assert_eq!(product.price, Some(dec!(49.90)));
    assert_eq!(product.title.as_deref(), Some("Lamp"));
    assert_eq!(product.description.as_deref(), Some("Hand-written description"));
    assert_eq!(product.brand.as_deref(), Some("Lumen"));
}

#[tokio::test]
async fn test_xml_feed_with_and_without_images() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(XML_URL, SHOP_XML);
    let app = create_app(&db_path, fetcher).await;

    let feed = app
        .feed_api
        .create_feed(feed_config(XML_URL, FeedFormat::Xml, xml_mappings()))
        .unwrap();
    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.counters.created, 2);
    assert_eq!(progress.counters.errors, 0);

    let grinder = app
        .catalog
        .find_by_match_key(MatchKey::Ean, "8590000000011")
        .unwrap()
        .remove(0);
    assert_eq!(grinder.price, Some(dec!(1299.00)));
    assert_eq!(grinder.description.as_deref(), Some("Burr grinder, <b>steel</b>"));
    assert_eq!(grinder.image_url.as_deref(), Some("https://img.example.com/a1.jpg"));
    assert_eq!(
        grinder.gallery_images,
        vec![
            "https://img.example.com/a1-2.jpg".to_string(),
            "https://img.example.com/a1-3.jpg".to_string()
        ]
    );

    // a second feed over the same items without images leaves them untouched
    let mut config = feed_config(XML_URL, FeedFormat::Xml, xml_mappings());
    config.import_images = false;
    config.field_mappings.push(FieldMapping::new("ITEM_ID", TargetField::Sku));
    let no_images = app.feed_api.create_feed(config).unwrap();
    app.import_api.start_import(&no_images.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&no_images.id).await.unwrap();
    assert_eq!(progress.counters.updated, 2);

    let grinder = app.catalog.get_product(&grinder.id).unwrap().unwrap();
    assert_eq!(grinder.sku.as_deref(), Some("A-1"));
    assert_eq!(grinder.image_url.as_deref(), Some("https://img.example.com/a1.jpg"));
    assert_eq!(grinder.gallery_images.len(), 2);
}

#[tokio::test]
async fn test_unreachable_feed_fails_the_run() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let app = create_app(&db_path, MemoryFetcher::new()).await;
    let feed = app.feed_api.create_feed(csv_feed(CSV_URL)).unwrap();

    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Failed);
    assert_eq!(progress.counters.processed, 0);
    let message = progress.error_message.clone().unwrap();
    assert!(message.contains("feed unreachable"), "{}", message);

    let history = app.import_api.get_import_history(&feed.id).unwrap();
    assert_eq!(history[0].status, RunStatus::Failed);
    assert_eq!(history[0].error_message.as_deref(), Some(message.as_str()));
    assert!(app.feed_api.get_feed(&feed.id).unwrap().last_run_at.is_some());

    // the feed is idle again and can be retried
    assert!(app.import_api.start_import(&feed.id).await.is_ok());
    app.import_api.wait_for_import(&feed.id).await.unwrap();
}

#[tokio::test]
async fn test_malformed_feed_fails_with_parse_error() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(XML_URL, "<SHOP><SHOPITEM><EAN>1</EAN></SHOP>");
    let app = create_app(&db_path, fetcher).await;
    let feed = app
        .feed_api
        .create_feed(feed_config(XML_URL, FeedFormat::Xml, xml_mappings()))
        .unwrap();

    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Failed);
    assert!(progress.error_message.as_deref().unwrap().contains("parse"));
    assert_eq!(app.catalog.count_products().unwrap(), 0);
}

#[tokio::test]
async fn test_csv_column_mismatch_is_a_record_error() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(CSV_URL, "ean;name;price\n1;One;1,00\n2;Two\n3;Three;3,00\n");
    let app = create_app(&db_path, fetcher).await;
    let feed = app.feed_api.create_feed(csv_feed(CSV_URL)).unwrap();

    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.counters.processed, 3);
    assert_eq!(progress.counters.created, 2);
    assert_eq!(progress.counters.errors, 1);
}

#[tokio::test]
async fn test_html_entity_in_one_item_does_not_stop_the_feed() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let mut body = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<SHOP>\n");
    for i in 1..=5 {
        let description = if i == 3 { "Size&nbsp;XL" } else { "Regular" };
        body.push_str(&format!(
            "<SHOPITEM><EAN>859000000010{}</EAN><PRODUCTNAME>Shirt {}</PRODUCTNAME>\
             <DESCRIPTION>{}</DESCRIPTION><PRICE_VAT>{}9,00</PRICE_VAT></SHOPITEM>\n",
            i, i, description, i
        ));
    }
    body.push_str("</SHOP>\n");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(XML_URL, body);
    let app = create_app(&db_path, fetcher).await;
    let feed = app
        .feed_api
        .create_feed(feed_config(XML_URL, FeedFormat::Xml, xml_mappings()))
        .unwrap();

    app.import_api.start_import(&feed.id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.total, Some(5));
    assert_eq!(progress.counters.created, 5);
    assert_eq!(progress.counters.errors, 0);

    let shirt = app
        .catalog
        .find_by_match_key(MatchKey::Ean, "8590000000103")
        .unwrap()
        .remove(0);
    assert_eq!(shirt.description.as_deref(), Some("Size\u{a0}XL"));
}

#[tokio::test]
async fn test_history_returns_every_run() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let app = create_app(&db_path, MemoryFetcher::new()).await;
    let feed = app.feed_api.create_feed(csv_feed(CSV_URL)).unwrap();

    let runs = ImportRunRepository::new(&db_path).unwrap();
    let t0 = Utc::now() - chrono::Duration::days(1);
    for i in 0..60 {
        let started = t0 + chrono::Duration::minutes(i);
        let mut run = ImportRun::start(format!("run-{:02}", i), feed.id.clone(), started);
        run.status = RunStatus::Completed;
        run.finished_at = Some(started + chrono::Duration::seconds(30));
        runs.insert(&run).unwrap();
    }

    let history = app.import_api.get_import_history(&feed.id).unwrap();
    assert_eq!(history.len(), 60);
    assert_eq!(history[0].id, "run-59");
    assert_eq!(history[59].id, "run-00");
}
