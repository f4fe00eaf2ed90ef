use std::collections::BTreeMap;

use derive_builder::Builder;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub neighborhood: String,
    pub cuisine_type: String,
    pub address: String,
    pub latlng: LatLng,
    /// basename of the photo, without extension
    pub photograph: Option<String>,
    pub operating_hours: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "de_favorite")]
    pub is_favorite: bool,
    // fields we don't model must survive a cache round trip unchanged
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    #[serde(deserialize_with = "de_number")]
    pub restaurant_id: i64,
    pub name: String,
    #[serde(deserialize_with = "de_rating")]
    pub rating: u8,
    pub comments: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of a review submission.
#[derive(Builder, Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub restaurant_id: i64,
    pub name: String,
    pub rating: u8,
    pub comments: String,
}

/// A restaurant together with its reviews.
#[derive(Debug, Clone)]
pub struct RestaurantDetail {
    pub restaurant: Restaurant,
    pub reviews: Vec<Review>,
}

/// Everything a map layer needs to place a pin for one restaurant.
#[derive(Debug, Clone, Serialize)]
pub struct MapMarker {
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub url: String,
}

impl Restaurant {
    pub fn page_url(&self) -> String {
        format!("./restaurant.html?id={}", self.id)
    }

    pub fn image_url(&self) -> Option<String> {
        self.photograph.as_ref().map(|p| format!("/img/{p}.jpg"))
    }

    pub fn map_marker(&self) -> MapMarker {
        MapMarker {
            lat: self.latlng.lat,
            lng: self.latlng.lng,
            title: self.name.clone(),
            url: self.page_url(),
        }
    }
}

#[derive(Builder, Debug, Clone, Default)]
pub struct RestaurantFilter {
    #[builder(setter(into, strip_option), default)]
    pub cuisine: Option<String>,
    #[builder(setter(into, strip_option), default)]
    pub neighborhood: Option<String>,
}

impl RestaurantFilter {
    pub fn matches(&self, restaurant: &Restaurant) -> bool {
        let cuisine_ok = self
            .cuisine
            .as_deref()
            .map_or(true, |c| restaurant.cuisine_type == c);
        let neighborhood_ok = self
            .neighborhood
            .as_deref()
            .map_or(true, |n| restaurant.neighborhood == n);
        cuisine_ok && neighborhood_ok
    }
}

pub fn filter_restaurants(
    restaurants: Vec<Restaurant>,
    filter: &RestaurantFilter,
) -> Vec<Restaurant> {
    restaurants
        .into_iter()
        .filter(|restaurant| filter.matches(restaurant))
        .collect()
}

/// Distinct neighborhoods, first occurrence wins the position.
pub fn distinct_neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
    let mut found = Vec::new();
    for restaurant in restaurants {
        if !found.contains(&restaurant.neighborhood) {
            found.push(restaurant.neighborhood.clone());
        }
    }
    found
}

/// Distinct cuisine types, first occurrence wins the position.
pub fn distinct_cuisines(restaurants: &[Restaurant]) -> Vec<String> {
    let mut found = Vec::new();
    for restaurant in restaurants {
        if !found.contains(&restaurant.cuisine_type) {
            found.push(restaurant.cuisine_type.clone());
        }
    }
    found
}

// The live endpoint is loose about scalar types: `is_favorite` flips between
// a bool and the strings "true"/"false", ratings and ids occasionally arrive
// as numeric strings.

fn de_favorite<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    Ok(match Flag::deserialize(de)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s == "true",
    })
}

fn de_number<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Text(String),
    }
    match Number::deserialize(de)? {
        Number::Int(n) => Ok(n),
        Number::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn de_rating<'de, D: Deserializer<'de>>(de: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rating {
        Int(u8),
        Text(String),
    }
    match Rating::deserialize(de)? {
        Rating::Int(n) => Ok(n),
        Rating::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
