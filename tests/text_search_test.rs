use tempfile::TempDir;

use vitrine::catalog::CatalogLoader;
use vitrine::{
    BackendKind, Category, Color, RawItem, Relaxation, SearchOutcome, TextSearchRequest,
    VitrineConfig, VitrineService,
};

fn item(id: &str, title: &str, category: &str, color: &str, price: f64) -> RawItem {
    RawItem {
        id: id.to_string(),
        title: title.to_string(),
        category: Some(category.to_string()),
        color: Some(color.to_string()),
        price,
        description: format!("{title} for everyday use"),
        tags: vec![category.to_string(), color.to_string()],
        image: None,
    }
}

fn text_only_config(cache: &TempDir) -> VitrineConfig {
    let mut config = VitrineConfig::default();
    config.cache.dir = cache.path().to_path_buf();
    config.text.backends = vec![BackendKind::LocalDense, BackendKind::Lexical];
    config.vision.backends = Vec::new();
    config
}

fn catalog() -> Vec<RawItem> {
    vec![
        item("s1", "Trail running shoes", "shoes", "black", 89.0),
        item("s2", "Canvas sneakers", "shoes", "white", 45.0),
        item("s3", "Leather boots", "shoes", "brown", 120.0),
        item("s4", "Road running shoes", "shoes", "blue", 99.0),
        item("s5", "Slip-on shoes", "shoes", "red", 35.0),
        item("b1", "Canvas tote bag", "bags", "green", 20.0),
        item("b2", "Laptop backpack", "bags", "black", 50.0),
        item("b3", "Leather weekender bag", "bags", "brown", 90.0),
        item("c1", "Baseball cap", "caps", "blue", 18.0),
        item("j1", "Rain jacket", "jackets", "yellow", 140.0),
    ]
}

async fn open_service(cache: &TempDir) -> vitrine::Result<VitrineService> {
    let service = VitrineService::new(text_only_config(cache))?;
    service
        .rebuild_from(CatalogLoader::from_raw(catalog())?, false)
        .await?;
    Ok(service)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_color_relaxed_when_category_has_no_match() -> vitrine::Result<()> {
    let cache = TempDir::new().unwrap();
    let service = open_service(&cache).await?;

    let request = TextSearchRequest::new("shoes").category("shoes").color("purple");
    let response = service.text_search(&request).await;

    assert_eq!(response.outcome, SearchOutcome::Matched);
    assert_eq!(
        response.relaxation,
        Some(Relaxation::Color {
            color: Color::Purple
        })
    );
    assert_eq!(response.hits.len(), 5);
    assert!(
        response
            .hits
            .iter()
            .all(|hit| hit.item.category == Some(Category::Shoes))
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_price_bound_is_inclusive_and_hard() -> vitrine::Result<()> {
    let cache = TempDir::new().unwrap();
    let service = open_service(&cache).await?;

    let request = TextSearchRequest::new("bag").category("bags").max_price(60.0);
    let response = service.text_search(&request).await;

    let mut ids = response.ids();
    ids.sort();
    assert_eq!(ids, vec!["b1", "b2"]);
    assert!(response.relaxation.is_none());

    let exact = TextSearchRequest::new("bag").category("bags").max_price(50.0);
    let response = service.text_search(&exact).await;
    assert!(response.ids().contains(&"b2"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_category_constraint_never_violated() -> vitrine::Result<()> {
    let cache = TempDir::new().unwrap();
    let service = open_service(&cache).await?;

    // A query that reads like another category must still stay in bags.
    for query in ["running shoes", "rain jacket", "", "leather"] {
        let request = TextSearchRequest::new(query).category("bag");
        let response = service.text_search(&request).await;
        assert!(!response.hits.is_empty(), "query {query:?} found nothing");
        for hit in &response.hits {
            assert_eq!(hit.item.category, Some(Category::Bags));
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_results_are_deterministic() -> vitrine::Result<()> {
    let cache = TempDir::new().unwrap();
    let service = open_service(&cache).await?;

    let request = TextSearchRequest::new("leather running shoes").top_k(6);
    let first = service.text_search(&request).await;
    let second = service.text_search(&request).await;

    assert_eq!(first.hits.len(), 6);
    assert_eq!(first.hits, second.hits);
    for pair in first.hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unmatched_filters_report_no_matches() -> vitrine::Result<()> {
    let cache = TempDir::new().unwrap();
    let service = open_service(&cache).await?;

    let request = TextSearchRequest::new("cap").category("caps").max_price(5.0);
    let response = service.text_search(&request).await;

    assert_eq!(response.outcome, SearchOutcome::NoMatches);
    assert!(response.hits.is_empty());
    assert!(!response.is_degraded());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_without_generation_is_degraded() -> vitrine::Result<()> {
    let cache = TempDir::new().unwrap();
    let service = VitrineService::new(text_only_config(&cache))?;

    let response = service.text_search(&TextSearchRequest::new("shoes")).await;

    assert!(response.is_degraded());
    assert!(response.hits.is_empty());
    assert!(response.generation.is_none());
    Ok(())
}
