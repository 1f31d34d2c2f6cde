use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{wallet_key, PlanStore, VerificationStore};
use crate::types::{
    AgentPlan, BioChallenge, Expiring, OAuthSession, PlanId, PlanStatus, VerificationRecord,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PendingKey {
    OAuth(String),
    Bio(String),
}

#[derive(Default)]
struct PendingState {
    oauth: HashMap<String, OAuthSession>,
    bio: HashMap<String, BioChallenge>,
    // Ordered by expiry so purging only touches what is due
    expiry: BTreeSet<(DateTime<Utc>, PendingKey)>,
}

impl PendingState {
    fn remove_oauth(&mut self, state: &str) -> Option<OAuthSession> {
        let session = self.oauth.remove(state)?;
        self.expiry
            .remove(&(session.expires_at, PendingKey::OAuth(state.to_string())));
        Some(session)
    }

    fn remove_bio(&mut self, key: &str) -> Option<BioChallenge> {
        let challenge = self.bio.remove(key)?;
        self.expiry
            .remove(&(challenge.expires_at, PendingKey::Bio(key.to_string())));
        Some(challenge)
    }
}

pub const DEFAULT_PLAN_CAPACITY: usize = 1000;

/// Plans in insertion order; the oldest are evicted past `capacity`.
struct PlanState {
    plans: HashMap<PlanId, AgentPlan>,
    order: VecDeque<PlanId>,
    capacity: usize,
}

impl PlanState {
    fn insert(&mut self, plan: &AgentPlan) {
        if self.plans.insert(plan.id.clone(), plan.clone()).is_none() {
            self.order.push_back(plan.id.clone());
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.plans.remove(&oldest);
                log::debug!("Evicted plan {} from memory", oldest);
            }
        }
    }
}

#[derive(Clone)]
pub struct InMemoryStore {
    plans: Arc<RwLock<PlanState>>,
    verifications: Arc<RwLock<HashMap<String, VerificationRecord>>>,
    pending: Arc<RwLock<PendingState>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_plan_capacity(DEFAULT_PLAN_CAPACITY)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan_capacity(capacity: usize) -> Self {
        Self {
            plans: Arc::new(RwLock::new(PlanState {
                plans: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            })),
            verifications: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(RwLock::new(PendingState::default())),
        }
    }

    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.plans.len()
    }

    pub async fn pending_count(&self) -> usize {
        let pending = self.pending.read().await;
        pending.oauth.len() + pending.bio.len()
    }

    async fn purge_before(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.pending.write().await;

        let due: Vec<(DateTime<Utc>, PendingKey)> = pending
            .expiry
            .iter()
            .take_while(|(expires_at, _)| *expires_at <= now)
            .cloned()
            .collect();

        for (_, key) in &due {
            match key {
                PendingKey::OAuth(state) => {
                    pending.remove_oauth(state);
                }
                PendingKey::Bio(wallet) => {
                    pending.remove_bio(wallet);
                }
            }
        }
        due.len()
    }
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn save_plan(&self, plan: &AgentPlan) -> Result<()> {
        self.plans.write().await.insert(plan);
        Ok(())
    }

    async fn get_plan(&self, id: &str) -> Result<Option<AgentPlan>> {
        let state = self.plans.read().await;
        Ok(state.plans.get(id).cloned())
    }

    async fn list_plans(&self, status: Option<PlanStatus>) -> Result<Vec<AgentPlan>> {
        let state = self.plans.read().await;
        let mut result: Vec<AgentPlan> = state
            .plans
            .values()
            .filter(|p| status.map(|s| p.status == s).unwrap_or(true))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(result)
    }
}

#[async_trait]
impl VerificationStore for InMemoryStore {
    async fn get_verification(&self, wallet_address: &str) -> Result<Option<VerificationRecord>> {
        let verifications = self.verifications.read().await;
        Ok(verifications.get(&wallet_key(wallet_address)).cloned())
    }

    async fn insert_verification(&self, record: &VerificationRecord) -> Result<bool> {
        let mut verifications = self.verifications.write().await;
        match verifications.entry(wallet_key(&record.wallet_address)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn save_oauth_session(&self, session: &OAuthSession) -> Result<()> {
        let mut pending = self.pending.write().await;
        pending.remove_oauth(&session.state);
        pending
            .expiry
            .insert((session.expires_at, PendingKey::OAuth(session.state.clone())));
        pending.oauth.insert(session.state.clone(), session.clone());
        Ok(())
    }

    async fn take_oauth_session(&self, state: &str) -> Result<Option<OAuthSession>> {
        let mut pending = self.pending.write().await;
        Ok(pending
            .remove_oauth(state)
            .filter(|session| !session.is_expired(Utc::now())))
    }

    async fn save_bio_challenge(&self, challenge: &BioChallenge) -> Result<()> {
        let key = wallet_key(&challenge.wallet_address);
        let mut pending = self.pending.write().await;
        pending.remove_bio(&key);
        pending
            .expiry
            .insert((challenge.expires_at, PendingKey::Bio(key.clone())));
        pending.bio.insert(key, challenge.clone());
        Ok(())
    }

    async fn get_bio_challenge(&self, wallet_address: &str) -> Result<Option<BioChallenge>> {
        let key = wallet_key(wallet_address);
        let mut pending = self.pending.write().await;

        let expired = match pending.bio.get(&key) {
            Some(challenge) => challenge.is_expired(Utc::now()),
            None => return Ok(None),
        };
        if expired {
            pending.remove_bio(&key);
            return Ok(None);
        }
        Ok(pending.bio.get(&key).cloned())
    }

    async fn remove_bio_challenge(&self, wallet_address: &str) -> Result<()> {
        let mut pending = self.pending.write().await;
        pending.remove_bio(&wallet_key(wallet_address));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        Ok(self.purge_before(Utc::now()).await)
    }
}
