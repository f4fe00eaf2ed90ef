use anyhow::Context;
use sqlx::SqlitePool;

use crate::data::{
    self, NewReview, Restaurant, RestaurantDetail, RestaurantFilter, Review,
};
use crate::db;
use crate::remote::RemoteApi;

/// What happened to a submitted review.
#[derive(Debug)]
pub enum Submission {
    /// The endpoint accepted it.
    Sent(Review),
    /// The endpoint was unreachable, the review waits in the local queue.
    Queued,
}

/// Listings and reviews, remote-first with the local cache behind it.
pub struct RestaurantStore {
    api: RemoteApi,
    pool: SqlitePool,
}

impl RestaurantStore {
    pub async fn open(api: RemoteApi, pool: SqlitePool) -> anyhow::Result<Self> {
        db::init(&pool).await?;
        Ok(Self { api, pool })
    }

    /// Full listing. A successful fetch refreshes the cache; an unreachable
    /// endpoint falls back to whatever the cache holds.
    pub async fn restaurants(&self) -> anyhow::Result<Vec<Restaurant>> {
        match self.api.restaurants().await {
            Ok(restaurants) => {
                db::save_restaurants(&self.pool, &restaurants).await?;
                Ok(restaurants)
            }
            Err(err) if is_offline(&err) => {
                let cached = db::cached_restaurants(&self.pool).await?;
                if cached.is_empty() {
                    return Err(err.context("endpoint unreachable and the local cache is empty"));
                }
                tracing::warn!(
                    "endpoint unreachable, serving {} restaurants from cache",
                    cached.len()
                );
                Ok(cached)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn reviews(&self, restaurant_id: i64) -> anyhow::Result<Vec<Review>> {
        match self.api.reviews(restaurant_id).await {
            Ok(reviews) => {
                db::save_reviews(&self.pool, &reviews).await?;
                Ok(reviews)
            }
            Err(err) if is_offline(&err) => {
                let cached = db::cached_reviews(&self.pool, restaurant_id).await?;
                tracing::warn!(
                    "endpoint unreachable, serving {} cached reviews for restaurant {restaurant_id}",
                    cached.len()
                );
                Ok(cached)
            }
            Err(err) => Err(err),
        }
    }

    /// One restaurant with its reviews attached. An id missing from the
    /// listing is an error; a failed review lookup only degrades the result.
    pub async fn restaurant(&self, id: i64) -> anyhow::Result<RestaurantDetail> {
        let restaurants = self.restaurants().await?;
        let restaurant = restaurants
            .into_iter()
            .find(|r| r.id == id)
            .with_context(|| format!("no restaurant with id {id}"))?;
        let reviews = match self.reviews(id).await {
            Ok(reviews) => reviews,
            Err(err) => {
                tracing::warn!("fail to load reviews for restaurant {id}: {err:#}");
                Vec::new()
            }
        };
        Ok(RestaurantDetail {
            restaurant,
            reviews,
        })
    }

    pub async fn filtered(&self, filter: &RestaurantFilter) -> anyhow::Result<Vec<Restaurant>> {
        let restaurants = self.restaurants().await?;
        Ok(data::filter_restaurants(restaurants, filter))
    }

    pub async fn neighborhoods(&self) -> anyhow::Result<Vec<String>> {
        Ok(data::distinct_neighborhoods(&self.restaurants().await?))
    }

    pub async fn cuisines(&self) -> anyhow::Result<Vec<String>> {
        Ok(data::distinct_cuisines(&self.restaurants().await?))
    }

    /// Flip the favorite flag remotely, then patch the cached record.
    pub async fn set_favorite(&self, restaurant_id: i64, is_favorite: bool) -> anyhow::Result<()> {
        self.api.set_favorite(restaurant_id, is_favorite).await?;
        db::mark_favorite(&self.pool, restaurant_id, is_favorite).await
    }

    /// Send a review, or queue it when the endpoint can't be reached.
    pub async fn submit_review(&self, review: NewReview) -> anyhow::Result<Submission> {
        match self.api.post_review(&review).await {
            Ok(created) => {
                db::save_reviews(&self.pool, std::slice::from_ref(&created)).await?;
                Ok(Submission::Sent(created))
            }
            Err(err) if is_offline(&err) => {
                tracing::warn!("endpoint unreachable, queueing review for replay");
                db::enqueue_review(&self.pool, &review).await?;
                Ok(Submission::Queued)
            }
            Err(err) => Err(err),
        }
    }

    /// Drain the pending queue, oldest first. Each entry is deleted only
    /// after its POST succeeds; the first failure stops the drain so nothing
    /// is lost. Returns how many reviews went out.
    pub async fn replay_pending(&self) -> anyhow::Result<usize> {
        let pending = db::pending_reviews(&self.pool).await?;
        let mut sent = 0;
        for (id, review) in pending {
            match self.api.post_review(&review).await {
                Ok(created) => {
                    db::save_reviews(&self.pool, std::slice::from_ref(&created)).await?;
                    db::remove_pending(&self.pool, id).await?;
                    sent += 1;
                }
                Err(err) => {
                    tracing::warn!("stopping replay, endpoint still failing: {err:#}");
                    break;
                }
            }
        }
        if sent > 0 {
            tracing::info!("replayed {sent} queued review(s)");
        }
        Ok(sent)
    }

    pub async fn pending_count(&self) -> anyhow::Result<i64> {
        db::pending_count(&self.pool).await
    }
}

fn is_offline(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .map(|e| e.is_connect() || e.is_timeout())
        .unwrap_or(false)
}
