use chrono::Utc;
use dotenvy::dotenv;
use std::env;

use trackademic::db::{self, seed};

fn is_dry_run() -> bool {
    !std::env::args().any(|a| a == "--apply")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://trackademic.db?mode=rwc".to_string());
    let now = Utc::now();

    if is_dry_run() {
        println!("[DRY RUN] Would create user {} ({})", seed::DEMO_EMAIL, seed::DEMO_NAME);
        for a in seed::sample_assignments(now) {
            println!(
                "[DRY RUN] Would create \"{}\" ({}) due {}",
                a.title,
                a.course,
                a.deadline.to_rfc3339()
            );
        }
        println!("Run with --apply to write to {}", database_url);
        return Ok(());
    }

    let pool = db::connect(&database_url).await?;
    db::migrate(&pool).await?;

    let report = seed::seed_demo_data(&pool, now).await?;
    if report.user_created {
        println!("Created user {}", seed::DEMO_EMAIL);
    } else {
        println!("User {} already exists", seed::DEMO_EMAIL);
    }
    if report.assignments_created == 0 {
        println!("Demo user already has assignments, nothing to add");
    } else {
        println!("Assignments created: {}", report.assignments_created);
    }

    pool.close().await;

    Ok(())
}
