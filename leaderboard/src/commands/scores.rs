use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::{Config, Overrides, StoreBackend};
use crate::store::{open_store, PlayerScore};

/// Print the stored leaderboard, highest score first
pub fn run(config_path: &Path, overrides: Overrides, limit: Option<usize>) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    config.apply(overrides);

    if config.store.backend == StoreBackend::Memory {
        bail!("The memory store keeps nothing between runs; there is no leaderboard to show");
    }

    let rt = tokio::runtime::Runtime::new()?;
    let mut scores = rt
        .block_on(async {
            let store = open_store(&config.store)?;
            store.list_all().await
        })
        .with_context(|| format!("Failed to read scores from {}", config.store.path.display()))?;

    rank(&mut scores);
    if let Some(limit) = limit {
        scores.truncate(limit);
    }

    if scores.is_empty() {
        println!("No scores recorded yet.");
        return Ok(());
    }

    println!("{:>4}  {:<42}  {:>12}", "#", "Player", "Score");
    for (i, entry) in scores.iter().enumerate() {
        println!("{:>4}  {:<42}  {:>12}", i + 1, entry.identity, entry.score);
    }

    Ok(())
}

/// Highest score first, ties broken by identity
fn rank(scores: &mut [PlayerScore]) {
    scores.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.identity.cmp(&b.identity))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_by_score_then_identity() {
        let mut scores = vec![
            PlayerScore::new("0xbb", 5),
            PlayerScore::new("0xcc", 20),
            PlayerScore::new("0xaa", 5),
        ];
        rank(&mut scores);

        let order: Vec<&str> = scores.iter().map(|s| s.identity.as_str()).collect();
        assert_eq!(order, vec!["0xcc", "0xaa", "0xbb"]);
    }
}
