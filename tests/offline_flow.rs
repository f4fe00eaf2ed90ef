use std::sync::Mutex;

use actix_web::{web, App, HttpResponse, HttpServer};
use restaurant_reviews::data::{NewReview, Review};
use restaurant_reviews::db;
use restaurant_reviews::remote::RemoteApi;
use restaurant_reviews::store::{RestaurantStore, Submission};
use serde_json::json;

// nothing listens on port 1, connects are refused immediately
const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

struct MockState {
    reviews: Mutex<Vec<Review>>,
    favorites: Mutex<Vec<(i64, bool)>>,
}

impl MockState {
    fn empty() -> web::Data<MockState> {
        web::Data::new(MockState {
            reviews: Mutex::new(Vec::new()),
            favorites: Mutex::new(Vec::new()),
        })
    }
}

#[actix_web::get("/restaurants")]
async fn restaurants() -> HttpResponse {
    // id 1 carries the stringly favorite flag the live endpoint produces
    HttpResponse::Ok().json(json!([
        {
            "id": 1,
            "name": "Mission Chinese Food",
            "neighborhood": "Manhattan",
            "cuisine_type": "Asian",
            "address": "171 E Broadway",
            "latlng": { "lat": 40.713829, "lng": -73.989667 },
            "photograph": "1",
            "is_favorite": "true",
        },
        {
            "id": 2,
            "name": "Emily",
            "neighborhood": "Brooklyn",
            "cuisine_type": "Pizza",
            "address": "919 Fulton St",
            "latlng": { "lat": 40.683555, "lng": -73.966393 },
            "photograph": "2",
            "is_favorite": false,
        },
    ]))
}

#[derive(serde::Deserialize)]
struct ReviewQuery {
    restaurant_id: i64,
}

#[actix_web::get("/reviews")]
async fn reviews(state: web::Data<MockState>, query: web::Query<ReviewQuery>) -> HttpResponse {
    let reviews = state.reviews.lock().unwrap();
    let matching = reviews
        .iter()
        .filter(|review| review.restaurant_id == query.restaurant_id)
        .cloned()
        .collect::<Vec<_>>();
    HttpResponse::Ok().json(matching)
}

#[actix_web::post("/reviews")]
async fn post_review(state: web::Data<MockState>, body: web::Json<NewReview>) -> HttpResponse {
    let review = body.into_inner();
    let mut reviews = state.reviews.lock().unwrap();
    let created = Review {
        id: reviews.len() as i64 + 1,
        restaurant_id: review.restaurant_id,
        name: review.name,
        rating: review.rating,
        comments: review.comments,
        extra: serde_json::Map::new(),
    };
    reviews.push(created.clone());
    HttpResponse::Ok().json(created)
}

#[derive(serde::Deserialize)]
struct FavoriteQuery {
    is_favorite: bool,
}

#[actix_web::put("/restaurants/{id}")]
async fn put_favorite(
    state: web::Data<MockState>,
    path: web::Path<i64>,
    query: web::Query<FavoriteQuery>,
) -> HttpResponse {
    state
        .favorites
        .lock()
        .unwrap()
        .push((path.into_inner(), query.is_favorite));
    HttpResponse::Ok().finish()
}

fn spawn_endpoint(state: web::Data<MockState>) -> (String, actix_web::dev::ServerHandle) {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(restaurants)
            .service(reviews)
            .service(post_review)
            .service(put_favorite)
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .expect("fail to bind mock endpoint");

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    tokio::spawn(server);
    (format!("http://{addr}"), handle)
}

async fn tmp_pool() -> (sqlx::SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(dir.path().join("cache.db"))
        .create_if_missing(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    (pool, dir)
}

fn review_for(restaurant_id: i64, comments: &str) -> NewReview {
    restaurant_reviews::data::NewReviewBuilder::default()
        .restaurant_id(restaurant_id)
        .name("Ann".to_string())
        .rating(5)
        .comments(comments.to_string())
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_fetch_fills_cache_then_survives_outage() {
    let (base, handle) = spawn_endpoint(MockState::empty());
    let (pool, _dir) = tmp_pool().await;
    let store = RestaurantStore::open(RemoteApi::new(base), pool.clone())
        .await
        .unwrap();

    let listing = store.restaurants().await.unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing[0].is_favorite, "string flag should parse as true");
    assert_eq!(store.cuisines().await.unwrap(), vec!["Asian", "Pizza"]);

    handle.stop(true).await;

    // the endpoint is gone, the cache keeps answering
    let cached = store.restaurants().await.unwrap();
    assert_eq!(cached.len(), 2);

    let filter = restaurant_reviews::data::RestaurantFilterBuilder::default()
        .cuisine("Pizza")
        .build()
        .unwrap();
    let pizza = store.filtered(&filter).await.unwrap();
    assert_eq!(pizza.len(), 1);
    assert_eq!(pizza[0].name, "Emily");
}

#[tokio::test(flavor = "multi_thread")]
async fn favorite_flip_reaches_endpoint_and_cache() {
    let state = MockState::empty();
    let (base, handle) = spawn_endpoint(state.clone());
    let (pool, _dir) = tmp_pool().await;
    let store = RestaurantStore::open(RemoteApi::new(base), pool.clone())
        .await
        .unwrap();

    store.restaurants().await.unwrap();
    store.set_favorite(2, true).await.unwrap();

    assert_eq!(*state.favorites.lock().unwrap(), vec![(2, true)]);

    let cached = db::cached_restaurants(&pool).await.unwrap();
    let emily = cached.iter().find(|r| r.id == 2).unwrap();
    assert!(emily.is_favorite);

    handle.stop(true).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn online_submission_is_accepted_and_cached() {
    let state = MockState::empty();
    let (base, handle) = spawn_endpoint(state.clone());
    let (pool, _dir) = tmp_pool().await;
    let store = RestaurantStore::open(RemoteApi::new(base), pool.clone())
        .await
        .unwrap();

    let outcome = store.submit_review(review_for(1, "came back twice")).await.unwrap();
    let Submission::Sent(created) = outcome else {
        panic!("expected the review to be sent");
    };
    assert_eq!(created.restaurant_id, 1);

    let detail = store.restaurant(1).await.unwrap();
    assert_eq!(detail.reviews.len(), 1);
    assert_eq!(detail.reviews[0].comments, "came back twice");

    handle.stop(true).await;

    // offline, the detail page still shows the cached review
    let detail = store.restaurant(1).await.unwrap();
    assert_eq!(detail.reviews.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn queued_reviews_replay_when_endpoint_returns() {
    let (pool, _dir) = tmp_pool().await;

    let offline = RestaurantStore::open(RemoteApi::new(DEAD_ENDPOINT), pool.clone())
        .await
        .unwrap();
    for comments in ["first", "second"] {
        let outcome = offline.submit_review(review_for(1, comments)).await.unwrap();
        assert!(matches!(outcome, Submission::Queued));
    }
    assert_eq!(offline.pending_count().await.unwrap(), 2);

    // reconnect: same cache, live endpoint
    let state = MockState::empty();
    let (base, handle) = spawn_endpoint(state.clone());
    let online = RestaurantStore::open(RemoteApi::new(base), pool.clone())
        .await
        .unwrap();

    assert_eq!(online.replay_pending().await.unwrap(), 2);
    assert_eq!(online.pending_count().await.unwrap(), 0);

    let received = state.reviews.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].comments, "first");
    assert_eq!(received[1].comments, "second");
    drop(received);

    let cached = db::cached_reviews(&pool, 1).await.unwrap();
    assert_eq!(cached.len(), 2);

    handle.stop(true).await;
}
