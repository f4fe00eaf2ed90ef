use anyhow::Context;

use crate::data::{NewReview, Restaurant, Review};

pub const DEFAULT_API_URL: &str = "http://localhost:1337";

/// Client for the listings endpoint.
pub struct RemoteApi {
    base: String,
    client: reqwest::Client,
}

impl RemoteApi {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn restaurants(&self) -> anyhow::Result<Vec<Restaurant>> {
        let url = format!("{}/restaurants", self.base);
        let restaurants: Vec<Restaurant> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("bad restaurant listing from {url}"))?;
        Ok(restaurants)
    }

    pub async fn reviews(&self, restaurant_id: i64) -> anyhow::Result<Vec<Review>> {
        let url = format!("{}/reviews?restaurant_id={restaurant_id}", self.base);
        let reviews: Vec<Review> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("bad review listing from {url}"))?;
        Ok(reviews)
    }

    pub async fn post_review(&self, review: &NewReview) -> anyhow::Result<Review> {
        let url = format!("{}/reviews", self.base);
        let created: Review = self
            .client
            .post(&url)
            .json(review)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("bad response to posted review")?;
        Ok(created)
    }

    pub async fn set_favorite(&self, restaurant_id: i64, is_favorite: bool) -> anyhow::Result<()> {
        let url = format!(
            "{}/restaurants/{restaurant_id}?is_favorite={is_favorite}",
            self.base
        );
        self.client.put(&url).send().await?.error_for_status()?;
        Ok(())
    }
}
