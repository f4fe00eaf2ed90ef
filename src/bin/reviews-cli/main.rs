use anyhow::Context;
use restaurant_reviews::{remote, remote::RemoteApi, store::RestaurantStore};

mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(true)
        .with_file(false)
        .pretty()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("fail to setup logging");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let command = match commands::Command::new(&args) {
        Ok(command) => command,
        Err(hint) => {
            eprintln!("{hint}\n\n{}", commands::USAGE);
            std::process::exit(2);
        }
    };

    let api_url =
        std::env::var("REVIEWS_API_URL").unwrap_or_else(|_| remote::DEFAULT_API_URL.to_string());
    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:reviews.db?mode=rwc".to_string());
    let pool = sqlx::SqlitePool::connect(&db_url)
        .await
        .with_context(|| format!("fail to open local cache at {db_url}"))?;

    let store = RestaurantStore::open(RemoteApi::new(api_url), pool).await?;
    command.run(&store).await
}
