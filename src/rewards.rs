//! Reward settlement
//!
//! Applies coin/score/streak deltas when a submission is accepted for
//! the first time. The profile datastore is owned by the surrounding
//! platform; this module only implements the settlement contract.
//! Settlement failures degrade to a zero delta so a poll response never
//! fails on rewards.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Deltas actually applied by one settlement, not cumulative totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDelta {
    pub coins: u32,
    pub points: u32,
    pub daily_solved: bool,
    pub streak: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub coins: u32,
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub solved_problems: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_solved_date: Option<NaiveDate>,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()>;
}

/// Settle rewards for an accepted first-time solve.
///
/// Returns a zero delta when the user is unknown or the store fails;
/// the verdict itself is unaffected either way.
pub async fn settle(
    store: &dyn ProfileStore,
    user_id: &str,
    problem_id: i64,
    score: u32,
    featured_id: Option<i64>,
) -> RewardDelta {
    match try_settle(store, user_id, problem_id, score, featured_id).await {
        Ok(delta) => delta,
        Err(e) => {
            warn!("Reward settlement failed for user {}: {:#}", user_id, e);
            RewardDelta::default()
        }
    }
}

async fn try_settle(
    store: &dyn ProfileStore,
    user_id: &str,
    problem_id: i64,
    score: u32,
    featured_id: Option<i64>,
) -> Result<RewardDelta> {
    let mut profile = store
        .load_profile(user_id)
        .await?
        .with_context(|| format!("Unknown user: {}", user_id))?;

    let today = Local::now().date_naive();
    let delta = apply_solve(&mut profile, problem_id, score, featured_id, today);

    store.save_profile(user_id, &profile).await?;

    info!(
        "Settled rewards for user {}: +{} coins, +{} points, streak {}",
        user_id, delta.coins, delta.points, delta.streak
    );
    Ok(delta)
}

/// Pure settlement step: mutates the profile and returns the deltas.
///
/// Streak: +1 if the last solve was exactly yesterday, unchanged if
/// already solved today, otherwise reset to 1. Coins and points are
/// awarded only for problems not already in the solved set.
fn apply_solve(
    profile: &mut UserProfile,
    problem_id: i64,
    score: u32,
    featured_id: Option<i64>,
    today: NaiveDate,
) -> RewardDelta {
    profile.streak = match profile.last_solved_date {
        Some(d) if d == today => profile.streak,
        Some(d) if Some(d) == today.pred_opt() => profile.streak + 1,
        _ => 1,
    };
    profile.last_solved_date = Some(today);

    let mut delta = RewardDelta {
        streak: profile.streak,
        daily_solved: featured_id == Some(problem_id),
        ..Default::default()
    };

    if !profile.solved_problems.contains(&problem_id) {
        profile.solved_problems.push(problem_id);
        profile.coins += 1;
        delta.coins = 1;
        profile.score += score as u64;
        delta.points = score;
    }

    delta
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    users: HashMap<String, UserProfile>,
}

/// Flat-file profile store, read-modify-write under a lock.
pub struct JsonProfileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load_all(&self) -> Result<ProfilesFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse profiles file {:?}", self.path)),
            // Missing file means no profiles yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProfilesFile::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read profiles file {:?}", self.path)),
        }
    }
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let _guard = self.lock.lock().await;
        let file = self.load_all().await?;
        Ok(file.users.get(user_id).cloned())
    }

    async fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.load_all().await?;
        file.users.insert(user_id.to_string(), profile.clone());
        let json = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write profiles file {:?}", self.path))?;
        Ok(())
    }
}

/// In-memory store for tests.
#[cfg(test)]
pub struct MemoryProfileStore {
    users: dashmap::DashMap<String, UserProfile>,
}

#[cfg(test)]
impl MemoryProfileStore {
    pub fn with_user(user_id: &str) -> Self {
        let users = dashmap::DashMap::new();
        users.insert(user_id.to_string(), UserProfile::default());
        Self { users }
    }
}

#[cfg(test)]
#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.get(user_id).map(|p| p.clone()))
    }

    async fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        self.users.insert(user_id.to_string(), profile.clone());
        Ok(())
    }
}
