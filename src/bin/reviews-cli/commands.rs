use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use restaurant_reviews::{
    data::{NewReviewBuilder, RestaurantFilterBuilder},
    store::{RestaurantStore, Submission},
};

pub(super) const USAGE: &str = "Usage:
  reviews-cli list [cuisine|-] [neighborhood]
  reviews-cli search <pattern>
  reviews-cli show <id>
  reviews-cli review <restaurant-id> <name> <rating> <comments...>
  reviews-cli favorite <restaurant-id> <true|false>
  reviews-cli neighborhoods
  reviews-cli cuisines
  reviews-cli sync";

pub(super) enum Command {
    List {
        cuisine: Option<String>,
        neighborhood: Option<String>,
    },
    Search(String),
    Show(i64),
    Review {
        restaurant_id: i64,
        name: String,
        rating: u8,
        comments: String,
    },
    Favorite {
        restaurant_id: i64,
        is_favorite: bool,
    },
    Neighborhoods,
    Cuisines,
    Sync,
}

impl Command {
    // "-" in a filter position means no filter there
    pub(super) fn new(args: &[String]) -> Result<Self, &'static str> {
        let Some(action) = args.first() else {
            return Err("missing action");
        };

        match action.as_str() {
            "list" => {
                let pick = |i: usize| args.get(i).filter(|v| v.as_str() != "-").cloned();
                Ok(Self::List {
                    cuisine: pick(1),
                    neighborhood: pick(2),
                })
            }
            "search" => {
                if args.len() < 2 {
                    Err("too less argument")
                } else {
                    Ok(Self::Search(args[1].clone()))
                }
            }
            "show" => {
                if args.len() < 2 {
                    return Err("too less argument");
                }
                let Ok(id) = args[1].parse() else {
                    return Err("Can not parse your argument into number");
                };
                Ok(Self::Show(id))
            }
            "review" => {
                if args.len() < 5 {
                    return Err("too less argument");
                }
                let Ok(restaurant_id) = args[1].parse() else {
                    return Err("Can not parse your argument into number");
                };
                let Ok(rating) = args[3].parse() else {
                    return Err("rating must be a number");
                };
                Ok(Self::Review {
                    restaurant_id,
                    name: args[2].clone(),
                    rating,
                    comments: args[4..].join(" "),
                })
            }
            "favorite" => {
                if args.len() < 3 {
                    return Err("too less argument");
                }
                let Ok(restaurant_id) = args[1].parse() else {
                    return Err("Can not parse your argument into number");
                };
                let is_favorite = match args[2].as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err("expected true or false"),
                };
                Ok(Self::Favorite {
                    restaurant_id,
                    is_favorite,
                })
            }
            "neighborhoods" => Ok(Self::Neighborhoods),
            "cuisines" => Ok(Self::Cuisines),
            "sync" => Ok(Self::Sync),
            _ => Err("unexpected action"),
        }
    }

    // consumed the command
    pub(super) async fn run(self, store: &RestaurantStore) -> anyhow::Result<()> {
        match self {
            Self::List {
                cuisine,
                neighborhood,
            } => {
                let mut filter = RestaurantFilterBuilder::default();
                if let Some(cuisine) = cuisine {
                    filter.cuisine(cuisine);
                }
                if let Some(neighborhood) = neighborhood {
                    filter.neighborhood(neighborhood);
                }
                let filter = filter.build().unwrap();

                for restaurant in store.filtered(&filter).await? {
                    let star = if restaurant.is_favorite { " *" } else { "" };
                    println!(
                        "{}. {} — {} ({}){star}",
                        restaurant.id,
                        restaurant.name,
                        restaurant.neighborhood,
                        restaurant.cuisine_type
                    );
                }
            }
            Self::Search(pattern) => {
                let restaurants = store.restaurants().await?;
                let matcher = SkimMatcherV2::default();
                let result: String = restaurants
                    .into_iter()
                    .filter(|restaurant| matcher.fuzzy_match(&restaurant.name, &pattern).is_some())
                    .fold(String::new(), |sumed, unit| {
                        format!("{sumed}\n{}. {}", unit.id, unit.name)
                    });
                println!("{}", result.trim_start());
            }
            Self::Show(id) => {
                let detail = store.restaurant(id).await?;
                let restaurant = &detail.restaurant;

                println!("{} ({})", restaurant.name, restaurant.cuisine_type);
                println!("{}, {}", restaurant.address, restaurant.neighborhood);
                let marker = restaurant.map_marker();
                println!(
                    "marker: {} @ {:.6},{:.6} -> {}",
                    marker.title, marker.lat, marker.lng, marker.url
                );
                if let Some(image) = restaurant.image_url() {
                    println!("image: {image}");
                }
                if let Some(hours) = &restaurant.operating_hours {
                    for (day, times) in hours {
                        println!("  {day}: {times}");
                    }
                }

                println!("\n{} review(s):", detail.reviews.len());
                for review in &detail.reviews {
                    println!("  [{}/5] {}: {}", review.rating, review.name, review.comments);
                }
            }
            Self::Review {
                restaurant_id,
                name,
                rating,
                comments,
            } => {
                let review = NewReviewBuilder::default()
                    .restaurant_id(restaurant_id)
                    .name(name)
                    .rating(rating)
                    .comments(comments)
                    .build()
                    .unwrap();
                match store.submit_review(review).await? {
                    Submission::Sent(created) => println!("Review {} accepted.", created.id),
                    Submission::Queued => {
                        println!("Endpoint unreachable, review queued. Run `reviews-cli sync` once back online.")
                    }
                }
            }
            Self::Favorite {
                restaurant_id,
                is_favorite,
            } => {
                store.set_favorite(restaurant_id, is_favorite).await?;
                println!("Updated.");
            }
            Self::Neighborhoods => {
                for neighborhood in store.neighborhoods().await? {
                    println!("{neighborhood}");
                }
            }
            Self::Cuisines => {
                for cuisine in store.cuisines().await? {
                    println!("{cuisine}");
                }
            }
            Self::Sync => {
                let sent = store.replay_pending().await?;
                let left = store.pending_count().await?;
                println!("Replayed {sent} review(s), {left} still pending.");
            }
        }

        Ok(())
    }
}
