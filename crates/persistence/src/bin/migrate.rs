#![deny(warnings)]

use persistence::default_sqlite_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    // Ensure directory exists
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .filter(|p| !p.contains(":memory:"));
    if let Some(path) = path {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = persistence::init_db(&url).await?;
    let saves = persistence::list_saves(&pool).await?;
    if saves.is_empty() {
        persistence::create_save(&pool, "default", Some("initialized")).await?;
    }
    println!("DB migrated at {} ({} saves)", url, saves.len().max(1));
    Ok(())
}
