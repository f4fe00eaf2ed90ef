use anyhow::Context;
use sqlx::{sqlite::SqlitePool, Row};

use crate::data::{NewReview, Restaurant, Review};

/// Create the cache tables when they don't exist yet. Records are stored
/// whole, as JSON text keyed by id, like the object stores they replace.
pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS restaurants (
    id INTEGER PRIMARY KEY,
    data TEXT NOT NULL
)"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY,
    restaurant_id INTEGER NOT NULL,
    data TEXT NOT NULL
)"#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_restaurant ON reviews (restaurant_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS pending_reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    data TEXT NOT NULL
)"#,
    )
    .execute(pool)
    .await
    .context("fail to create cache tables")?;

    Ok(())
}

pub async fn save_restaurants(
    pool: &SqlitePool,
    restaurants: &[Restaurant],
) -> anyhow::Result<()> {
    for restaurant in restaurants {
        let data = serde_json::to_string(restaurant)?;
        sqlx::query("INSERT OR REPLACE INTO restaurants (id, data) VALUES (?, ?)")
            .bind(restaurant.id)
            .bind(data)
            .execute(pool)
            .await
            .with_context(|| format!("fail to cache restaurant {}", restaurant.id))?;
    }
    Ok(())
}

pub async fn cached_restaurants(pool: &SqlitePool) -> anyhow::Result<Vec<Restaurant>> {
    let rows = sqlx::query("SELECT data FROM restaurants ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| {
            let data: String = row.get("data");
            serde_json::from_str(&data).context("corrupt restaurant record in cache")
        })
        .collect()
}

pub async fn save_reviews(pool: &SqlitePool, reviews: &[Review]) -> anyhow::Result<()> {
    for review in reviews {
        let data = serde_json::to_string(review)?;
        sqlx::query("INSERT OR REPLACE INTO reviews (id, restaurant_id, data) VALUES (?, ?, ?)")
            .bind(review.id)
            .bind(review.restaurant_id)
            .bind(data)
            .execute(pool)
            .await
            .with_context(|| format!("fail to cache review {}", review.id))?;
    }
    Ok(())
}

pub async fn cached_reviews(pool: &SqlitePool, restaurant_id: i64) -> anyhow::Result<Vec<Review>> {
    let rows = sqlx::query("SELECT data FROM reviews WHERE restaurant_id = ? ORDER BY id")
        .bind(restaurant_id)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| {
            let data: String = row.get("data");
            serde_json::from_str(&data).context("corrupt review record in cache")
        })
        .collect()
}

/// Patch the favorite flag on a cached restaurant. A record the cache has
/// never seen is left alone, the remote stays the source of truth for it.
pub async fn mark_favorite(
    pool: &SqlitePool,
    restaurant_id: i64,
    is_favorite: bool,
) -> anyhow::Result<()> {
    let row = sqlx::query("SELECT data FROM restaurants WHERE id = ?")
        .bind(restaurant_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else { return Ok(()) };

    let data: String = row.get("data");
    let mut restaurant: Restaurant =
        serde_json::from_str(&data).context("corrupt restaurant record in cache")?;
    restaurant.is_favorite = is_favorite;

    sqlx::query("INSERT OR REPLACE INTO restaurants (id, data) VALUES (?, ?)")
        .bind(restaurant_id)
        .bind(serde_json::to_string(&restaurant)?)
        .execute(pool)
        .await
        .with_context(|| format!("fail to update cached restaurant {restaurant_id}"))?;
    Ok(())
}

pub async fn enqueue_review(pool: &SqlitePool, review: &NewReview) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO pending_reviews (data) VALUES (?)")
        .bind(serde_json::to_string(review)?)
        .execute(pool)
        .await
        .context("fail to queue review for replay")?;
    Ok(())
}

/// Queued submissions, oldest first.
pub async fn pending_reviews(pool: &SqlitePool) -> anyhow::Result<Vec<(i64, NewReview)>> {
    let rows = sqlx::query("SELECT id, data FROM pending_reviews ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| -> anyhow::Result<(i64, NewReview)> {
            let id: i64 = row.get("id");
            let data: String = row.get("data");
            let review = serde_json::from_str(&data).context("corrupt queued review")?;
            Ok((id, review))
        })
        .collect()
}

pub async fn remove_pending(pool: &SqlitePool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM pending_reviews WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn pending_count(pool: &SqlitePool) -> anyhow::Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM pending_reviews")
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init(&pool).await.unwrap();
    pool
}

#[cfg(test)]
pub(crate) fn sample_restaurant(id: i64, name: &str) -> Restaurant {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "neighborhood": "Brooklyn",
        "cuisine_type": "Pizza",
        "address": "919 Fulton St",
        "latlng": { "lat": 40.683555, "lng": -73.966393 },
    }))
    .unwrap()
}

#[cfg(test)]
pub(crate) fn sample_new_review(restaurant_id: i64, comments: &str) -> NewReview {
    crate::data::NewReviewBuilder::default()
        .restaurant_id(restaurant_id)
        .name("Ann".to_string())
        .rating(5)
        .comments(comments.to_string())
        .build()
        .unwrap()
}

#[tokio::test]
async fn cache_upserts_by_id() {
    let pool = test_pool().await;

    let first = vec![sample_restaurant(1, "Emily"), sample_restaurant(2, "Roberta's")];
    save_restaurants(&pool, &first).await.unwrap();

    // saving again under the same id replaces, not duplicates
    let renamed = vec![sample_restaurant(2, "Roberta's Pizza")];
    save_restaurants(&pool, &renamed).await.unwrap();

    let cached = cached_restaurants(&pool).await.unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[1].name, "Roberta's Pizza");
}

#[tokio::test]
async fn reviews_are_cached_per_restaurant() {
    let pool = test_pool().await;

    let reviews: Vec<Review> = serde_json::from_value(serde_json::json!([
        { "id": 1, "restaurant_id": 1, "name": "Ann", "rating": 5, "comments": "great" },
        { "id": 2, "restaurant_id": 2, "name": "Bob", "rating": 3, "comments": "fine" },
        { "id": 3, "restaurant_id": 1, "name": "Cid", "rating": 4, "comments": "good" },
    ]))
    .unwrap();
    save_reviews(&pool, &reviews).await.unwrap();

    let for_one = cached_reviews(&pool, 1).await.unwrap();
    assert_eq!(for_one.len(), 2);
    assert!(for_one.iter().all(|r| r.restaurant_id == 1));
}

#[tokio::test]
async fn favorite_patch_applies_only_to_known_records() {
    let pool = test_pool().await;
    save_restaurants(&pool, &[sample_restaurant(1, "Emily")])
        .await
        .unwrap();

    mark_favorite(&pool, 1, true).await.unwrap();
    mark_favorite(&pool, 99, true).await.unwrap();

    let cached = cached_restaurants(&pool).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert!(cached[0].is_favorite);
}

#[tokio::test]
async fn queue_keeps_insertion_order() {
    let pool = test_pool().await;

    enqueue_review(&pool, &sample_new_review(1, "first")).await.unwrap();
    enqueue_review(&pool, &sample_new_review(2, "second")).await.unwrap();
    assert_eq!(pending_count(&pool).await.unwrap(), 2);

    let pending = pending_reviews(&pool).await.unwrap();
    assert_eq!(pending[0].1.comments, "first");
    assert_eq!(pending[1].1.comments, "second");

    remove_pending(&pool, pending[0].0).await.unwrap();
    let pending = pending_reviews(&pool).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].1.comments, "second");
}
