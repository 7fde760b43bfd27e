//! `nearserve reviews` handlers.

use clap::{ArgGroup, Subcommand};
use nearserve_core::{NewReview, Review};

/// Sub-commands available under `reviews`.
#[derive(Debug, Subcommand)]
pub enum ReviewCommands {
    /// Rate a provider from 1 to 5
    Add {
        /// Provider id
        provider_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        rating: u8,
        /// Name shown next to the review
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        comment: Option<String>,
    },
    /// List reviews for a provider or by a user, newest first
    #[command(group(ArgGroup::new("target").required(true).args(["provider", "user"])))]
    List {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: ReviewCommands) -> anyhow::Result<()> {
    match command {
        ReviewCommands::Add {
            provider_id,
            user,
            rating,
            name,
            comment,
        } => {
            let review = NewReview {
                user_id: user,
                user_name: name.unwrap_or_default(),
                rating,
                comment: comment.unwrap_or_default(),
            };
            let (stored, aggregate) =
                nearserve_db::submit_review(pool, &provider_id, &review).await?;
            println!(
                "review {} saved; provider now rated {:.1} from {} review(s)",
                stored.id, aggregate.average, aggregate.count
            );
            Ok(())
        }
        ReviewCommands::List { provider, user } => {
            let reviews = match (provider, user) {
                (Some(provider_id), _) => {
                    nearserve_db::list_reviews_by_provider(pool, &provider_id).await?
                }
                (None, Some(user_id)) => nearserve_db::list_reviews_by_user(pool, &user_id).await?,
                (None, None) => anyhow::bail!("pass --provider or --user"),
            };
            print_reviews(&reviews);
            Ok(())
        }
    }
}

fn print_reviews(reviews: &[Review]) {
    if reviews.is_empty() {
        println!("no reviews yet");
        return;
    }

    let header = format!("{:<18}{:<20}{:<8}COMMENT", "DATE", "BY", "RATING");
    println!("{header}");
    for review in reviews {
        let stars = "*".repeat(usize::from(review.rating));
        println!(
            "{:<18}{:<20}{:<8}{}",
            review.created_at.format("%Y-%m-%d %H:%M").to_string(),
            crate::truncate(&review.user_name, 17),
            stars,
            crate::truncate(&review.comment, 60)
        );
    }
}
