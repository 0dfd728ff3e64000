use chrono::NaiveDate;
use home_designer::design::{
    ContractState, DesignRepository, Favorite, FavoriteId, PersistenceError, TreeBundle,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SAMPLE_COMMUNITY: &str = include_str!("../data/sample_community.json");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedContract {
    job_id: u64,
    contract: ContractState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCatalog {
    plans: Vec<TreeBundle>,
    #[serde(default)]
    contracts: Vec<SeedContract>,
    #[serde(default)]
    favorites: Vec<Favorite>,
}

/// Process-local stand-in for the catalog, contract, and favorites services.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDesignRepository {
    plans: Arc<HashMap<u64, TreeBundle>>,
    contracts: Arc<HashMap<u64, ContractState>>,
    favorites: Arc<Mutex<HashMap<FavoriteId, Favorite>>>,
}

impl InMemoryDesignRepository {
    /// Repository preloaded with the bundled sample community.
    pub(crate) fn seeded() -> Result<Self, PersistenceError> {
        Self::from_json(SAMPLE_COMMUNITY)
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self, PersistenceError> {
        let seed: SeedCatalog = serde_json::from_str(raw)
            .map_err(|err| PersistenceError::failed("seed_catalog", err.to_string()))?;

        Ok(Self {
            plans: Arc::new(
                seed.plans
                    .into_iter()
                    .map(|bundle| (bundle.plan_id, bundle))
                    .collect(),
            ),
            contracts: Arc::new(
                seed.contracts
                    .into_iter()
                    .map(|entry| (entry.job_id, entry.contract))
                    .collect(),
            ),
            favorites: Arc::new(Mutex::new(
                seed.favorites
                    .into_iter()
                    .map(|favorite| (favorite.id, favorite))
                    .collect(),
            )),
        })
    }

    pub(crate) fn favorite(&self, id: FavoriteId) -> Option<Favorite> {
        self.favorites
            .lock()
            .expect("favorites mutex poisoned")
            .get(&id)
            .cloned()
    }
}

impl DesignRepository for InMemoryDesignRepository {
    fn load_bundle(&self, plan_id: u64) -> Result<TreeBundle, PersistenceError> {
        self.plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found(format!("plan {plan_id}")))
    }

    fn load_favorite(&self, id: FavoriteId) -> Result<Option<Favorite>, PersistenceError> {
        Ok(self.favorite(id))
    }

    fn load_contract(&self, job_id: u64) -> Result<ContractState, PersistenceError> {
        self.contracts
            .get(&job_id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found(format!("job {job_id}")))
    }

    fn save_favorite(&self, favorite: &Favorite) -> Result<(), PersistenceError> {
        let mut guard = self.favorites.lock().expect("favorites mutex poisoned");
        if guard
            .get(&favorite.id)
            .is_some_and(|stored| stored.revision > favorite.revision)
        {
            return Err(PersistenceError::failed(
                "save_favorite",
                format!("favorite {} has a newer revision", favorite.id.0),
            ));
        }
        debug!(favorite_id = favorite.id.0, revision = favorite.revision, "favorite saved");
        guard.insert(favorite.id, favorite.clone());
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_repository_loads_the_sample_community() {
        let repository = InMemoryDesignRepository::seeded().expect("seed parses");

        let bundle = repository.load_bundle(3).expect("plan 3 seeded");
        assert_eq!(bundle.tree.points().count(), 7);
        assert_eq!(bundle.rules.choice_rules.len(), 1);

        let contract = repository.load_contract(501).expect("job 501 seeded");
        assert_eq!(contract.contracted_choices().len(), 1);
        assert!(repository
            .load_favorite(FavoriteId(7))
            .expect("lookup succeeds")
            .is_some());

        assert!(matches!(
            repository.load_bundle(4),
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[test]
    fn stale_favorite_revisions_are_rejected() {
        let repository = InMemoryDesignRepository::seeded().expect("seed parses");
        let mut favorite = repository.favorite(FavoriteId(7)).expect("favorite seeded");
        favorite.revision = 3;
        repository.save_favorite(&favorite).expect("newer revision saves");

        favorite.revision = 2;
        assert!(repository.save_favorite(&favorite).is_err());
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert_eq!(
            parse_date(" 2026-10-16 "),
            Ok(NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date"))
        );
        assert!(parse_date("16/10/2026").is_err());
    }
}
