//! Shared reference data: countries, active clients, roles and the
//! per-client business units.
//!
//! Global lists load at most once per process lifetime. Concurrent callers
//! that arrive before the first load finishes wait on the same in-flight
//! request instead of issuing their own. Business units are always fetched
//! fresh and overwrite their cache entry.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::RwLock;

use tokio::sync::Mutex;

use console_core::{BusinessUnitOption, ClientId, ClientOption, Country, CountryId, Role};

use crate::error::ClientError;
use crate::http::HttpClient;

/// A cached list with its load state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceList<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<ClientError>,
    loaded: bool,
}

impl<T> Default for ReferenceList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            loaded: false,
        }
    }
}

impl<T> ReferenceList<T> {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Which global list to invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Countries,
    Clients,
    Roles,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Countries => "countries",
            ReferenceKind::Clients => "clients",
            ReferenceKind::Roles => "roles",
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    kind: ReferenceKind,
    state: RwLock<SlotState<T>>,
    gate: Mutex<()>,
}

#[derive(Debug)]
struct SlotState<T> {
    list: ReferenceList<T>,
    // Bumped when a load finishes; lets waiters see an attempt completed.
    attempts: u64,
}

impl<T: Clone> Slot<T> {
    fn new(kind: ReferenceKind) -> Self {
        Self {
            kind,
            state: RwLock::new(SlotState {
                list: ReferenceList::default(),
                attempts: 0,
            }),
            gate: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> ReferenceList<T> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).list.clone()
    }

    fn loaded_items(&self) -> Option<Vec<T>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.list.loaded.then(|| state.list.items.clone())
    }

    fn attempts(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).attempts
    }

    fn update(&self, f: impl FnOnce(&mut SlotState<T>)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
    }

    /// Load once; later and concurrent callers share the outcome.
    async fn ensure<F, Fut>(&self, fetch: F) -> Result<Vec<T>, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, ClientError>>,
    {
        if let Some(items) = self.loaded_items() {
            return Ok(items);
        }

        let seen = self.attempts();
        let _guard = self.gate.lock().await;

        if let Some(items) = self.loaded_items() {
            return Ok(items);
        }
        // A load failed while we were waiting; report it rather than retry.
        if self.attempts() != seen {
            let error = self.snapshot().error;
            if let Some(error) = error {
                return Err(error);
            }
        }

        self.update(|s| {
            s.list.loading = true;
            s.list.error = None;
        });

        let result = fetch().await;
        let kind = self.kind.as_str();

        match result {
            Ok(items) => {
                tracing::debug!(kind, count = items.len(), "reference list loaded");
                self.update(|s| {
                    s.list.items = items.clone();
                    s.list.loading = false;
                    s.list.loaded = true;
                    s.attempts += 1;
                });
                Ok(items)
            }
            Err(err) => {
                tracing::warn!(kind, error = %err, "reference list failed to load");
                self.update(|s| {
                    s.list.loading = false;
                    s.list.error = Some(err.clone());
                    s.attempts += 1;
                });
                Err(err)
            }
        }
    }

    fn invalidate(&self) {
        self.update(|s| s.list = ReferenceList::default());
    }
}

#[derive(Debug)]
pub struct ReferenceDataCache {
    http: HttpClient,
    countries: Slot<Country>,
    clients: Slot<ClientOption>,
    roles: Slot<Role>,
    business_units: RwLock<HashMap<ClientId, ReferenceList<BusinessUnitOption>>>,
}

impl ReferenceDataCache {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            countries: Slot::new(ReferenceKind::Countries),
            clients: Slot::new(ReferenceKind::Clients),
            roles: Slot::new(ReferenceKind::Roles),
            business_units: RwLock::new(HashMap::new()),
        }
    }

    pub async fn countries(&self) -> Result<Vec<Country>, ClientError> {
        self.countries
            .ensure(|| async {
                let envelope = self.http.get_envelope::<Vec<Country>>(&self.http.endpoints().countries()).await?;
                if !envelope.success {
                    return Err(ClientError::rejected(or_default(envelope.message, "Failed to fetch countries")));
                }
                Ok(envelope.data.unwrap_or_default())
            })
            .await
    }

    pub fn countries_snapshot(&self) -> ReferenceList<Country> {
        self.countries.snapshot()
    }

    /// Filter the cached countries; an empty search returns all of them.
    pub fn filter_countries(&self, search: &str) -> Vec<Country> {
        let search = search.trim();
        let countries = self.countries.snapshot().items;
        if search.is_empty() {
            return countries;
        }
        countries.into_iter().filter(|c| c.matches(search)).collect()
    }

    /// Find a cached country by id, falling back to its ISD code.
    pub fn find_country(&self, country_id: Option<&CountryId>, isd_code: &str) -> Option<Country> {
        let countries = self.countries.snapshot().items;
        country_id
            .and_then(|id| countries.iter().find(|c| &c.id == id))
            .or_else(|| {
                let isd = isd_code.trim_start_matches('+');
                (!isd.is_empty())
                    .then(|| countries.iter().find(|c| c.isd_code.trim_start_matches('+') == isd))
                    .flatten()
            })
            .cloned()
    }

    pub async fn clients(&self) -> Result<Vec<ClientOption>, ClientError> {
        self.clients
            .ensure(|| async {
                let envelope = self
                    .http
                    .get_envelope::<Vec<ClientOption>>(&self.http.endpoints().active_clients())
                    .await?;
                // This endpoint is judged by its payload, not the flag.
                envelope
                    .data
                    .ok_or_else(|| ClientError::rejected(or_default(envelope.message, "Failed to fetch clients")))
            })
            .await
    }

    pub fn clients_snapshot(&self) -> ReferenceList<ClientOption> {
        self.clients.snapshot()
    }

    /// Fetch one active client by id (not cached).
    pub async fn fetch_client(&self, id: &ClientId) -> Result<ClientOption, ClientError> {
        let envelope = self.http.get_envelope::<ClientOption>(&self.http.endpoints().client(id)).await?;
        envelope
            .data
            .ok_or_else(|| ClientError::rejected(or_default(envelope.message, "Client not found")))
    }

    pub async fn roles(&self) -> Result<Vec<Role>, ClientError> {
        self.roles
            .ensure(|| async {
                let envelope = self.http.get_envelope::<Vec<Role>>(&self.http.endpoints().roles()).await?;
                if !envelope.success {
                    return Err(ClientError::rejected(or_default(envelope.message, "Failed to fetch roles")));
                }
                Ok(envelope.data.unwrap_or_default())
            })
            .await
    }

    pub fn roles_snapshot(&self) -> ReferenceList<Role> {
        self.roles.snapshot()
    }

    /// Drop a global list so the next access loads it again.
    pub fn invalidate(&self, kind: ReferenceKind) {
        tracing::debug!(kind = kind.as_str(), "reference list invalidated");
        match kind {
            ReferenceKind::Countries => self.countries.invalidate(),
            ReferenceKind::Clients => self.clients.invalidate(),
            ReferenceKind::Roles => self.roles.invalidate(),
        }
    }

    /// Fetch the business units of a client, always from the network.
    ///
    /// An empty client id clears the whole cache instead.
    pub async fn fetch_business_units(&self, client_id: &ClientId) -> Result<Vec<BusinessUnitOption>, ClientError> {
        if client_id.is_empty() {
            self.clear_business_units(None);
            return Ok(Vec::new());
        }

        self.update_business_units(client_id, |entry| {
            entry.loading = true;
            entry.error = None;
        });

        let result = self
            .http
            .get_envelope::<Vec<BusinessUnitOption>>(&self.http.endpoints().business_units(client_id))
            .await;

        match result {
            Ok(envelope) => {
                let items = envelope.data.unwrap_or_default();
                tracing::debug!(client_id = %client_id, count = items.len(), "business units loaded");
                self.update_business_units(client_id, |entry| {
                    entry.items = items.clone();
                    entry.loading = false;
                    entry.loaded = true;
                });
                Ok(items)
            }
            Err(err) => {
                tracing::warn!(client_id = %client_id, error = %err, "business units failed to load");
                self.update_business_units(client_id, |entry| {
                    entry.loading = false;
                    entry.error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    fn update_business_units(&self, client_id: &ClientId, f: impl FnOnce(&mut ReferenceList<BusinessUnitOption>)) {
        let mut cache = self.business_units.write().unwrap_or_else(|e| e.into_inner());
        f(cache.entry(client_id.clone()).or_default());
    }

    /// Cached business units of a client (empty when never fetched).
    pub fn business_units(&self, client_id: &ClientId) -> Vec<BusinessUnitOption> {
        self.business_unit_list(client_id).items
    }

    pub fn business_unit_list(&self, client_id: &ClientId) -> ReferenceList<BusinessUnitOption> {
        self.business_units
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(client_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every cached business-unit list, ordered by client id.
    pub fn business_unit_cache(&self) -> BTreeMap<ClientId, Vec<BusinessUnitOption>> {
        self.business_units
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, list)| (id.clone(), list.items.clone()))
            .collect()
    }

    /// Clear one client's entry, or everything with `None`.
    pub fn clear_business_units(&self, client_id: Option<&ClientId>) {
        let mut cache = self.business_units.write().unwrap_or_else(|e| e.into_inner());
        match client_id {
            Some(id) => {
                cache.remove(id);
            }
            None => cache.clear(),
        }
    }
}

fn or_default(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn slot_loads_once_across_concurrent_callers() {
        let slot: Slot<u32> = Slot::new(ReferenceKind::Roles);
        let calls = Arc::new(AtomicUsize::new(0));

        let load = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(vec![1, 2, 3])
            }
        };

        let (a, b, c) = tokio::join!(slot.ensure(load), slot.ensure(load), slot.ensure(load));
        assert_eq!(a.unwrap(), vec![1, 2, 3]);
        assert_eq!(b.unwrap(), vec![1, 2, 3]);
        assert_eq!(c.unwrap(), vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let again = slot.ensure(load).await.unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(slot.snapshot().is_loaded());
    }

    #[tokio::test]
    async fn failed_load_is_recorded_and_retried_later() {
        let slot: Slot<u32> = Slot::new(ReferenceKind::Countries);

        let err = slot
            .ensure(|| async { Err(ClientError::Transport("offline".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Transport("offline".into()));

        let snapshot = slot.snapshot();
        assert!(!snapshot.is_loaded());
        assert!(!snapshot.loading);
        assert_eq!(snapshot.error, Some(ClientError::Transport("offline".into())));

        let items = slot.ensure(|| async { Ok(vec![7]) }).await.unwrap();
        assert_eq!(items, vec![7]);
        assert_eq!(slot.snapshot().error, None);
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let slot: Slot<u32> = Slot::new(ReferenceKind::Clients);
        slot.ensure(|| async { Ok(vec![1]) }).await.unwrap();
        slot.invalidate();
        assert!(!slot.snapshot().is_loaded());
        let items = slot.ensure(|| async { Ok(vec![2]) }).await.unwrap();
        assert_eq!(items, vec![2]);
    }
}
