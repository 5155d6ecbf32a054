//! REST-backed domain stores.
//!
//! Each slice (equipment, projects, invoices) is a [`ResourceStore`] over its
//! item type: a [`Store`] holding the fetched list plus its load status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::api::{endpoints, ApiClient};
use crate::error::ApiResult;
use crate::store::{Selection, Store, StoreState};

/// Item types served by a list endpoint
pub trait Resource:
    Clone + PartialEq + fmt::Debug + DeserializeOwned + Send + Sync + 'static
{
    /// Store name used in logs
    const NAME: &'static str;
    /// List endpoint
    const ENDPOINT: &'static str;

    fn id(&self) -> i64;
}

/// Where a slice is in its fetch cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub items: Vec<T>,
    pub status: LoadStatus,
    pub error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            status: LoadStatus::Idle,
            error: None,
            loaded_at: None,
        }
    }
}

/// Partial update of [`ResourceState`]
#[derive(Debug, Clone)]
pub struct ResourcePatch<T> {
    pub items: Option<Vec<T>>,
    pub status: Option<LoadStatus>,
    pub error: Option<Option<String>>,
    pub loaded_at: Option<Option<DateTime<Utc>>>,
}

impl<T> Default for ResourcePatch<T> {
    fn default() -> Self {
        Self {
            items: None,
            status: None,
            error: None,
            loaded_at: None,
        }
    }
}

impl<T: Resource> StoreState for ResourceState<T> {
    type Patch = ResourcePatch<T>;

    fn apply_patch(&mut self, patch: ResourcePatch<T>) {
        if let Some(items) = patch.items {
            self.items = items;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(loaded_at) = patch.loaded_at {
            self.loaded_at = loaded_at;
        }
    }
}

/// List endpoints answer with either a bare array or a page object
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    List(Vec<T>),
    Page { items: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::List(items) | ListResponse::Page { items } => items,
        }
    }
}

/// One REST-backed slice
pub struct ResourceStore<T: Resource> {
    store: Store<ResourceState<T>>,
}

impl<T: Resource> Clone for ResourceStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Resource> Default for ResourceStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Resource> ResourceStore<T> {
    pub fn new() -> Self {
        Self {
            store: Store::new(T::NAME, ResourceState::default()),
        }
    }

    pub fn store(&self) -> &Store<ResourceState<T>> {
        &self.store
    }

    pub fn items(&self) -> Vec<T> {
        self.store.get_state().items.clone()
    }

    pub fn status(&self) -> LoadStatus {
        self.store.get_state().status
    }

    pub fn error(&self) -> Option<String> {
        self.store.get_state().error.clone()
    }

    pub fn watch_items(&self) -> Selection<Vec<T>> {
        self.store.select(|s: &ResourceState<T>| s.items.clone())
    }

    /// Fetch the list, returning the number of items stored
    pub async fn load(&self, api: &ApiClient) -> ApiResult<usize> {
        self.store.patch(ResourcePatch {
            status: Some(LoadStatus::Loading),
            error: Some(None),
            ..Default::default()
        });
        debug!(store = T::NAME, endpoint = T::ENDPOINT, "Loading resources");

        match api.get_json::<ListResponse<T>>(T::ENDPOINT).await {
            Ok(response) => {
                let items = response.into_items();
                let count = items.len();
                self.store.patch(ResourcePatch {
                    items: Some(items),
                    status: Some(LoadStatus::Ready),
                    error: Some(None),
                    loaded_at: Some(Some(Utc::now())),
                });
                info!(store = T::NAME, count, "Resources loaded");
                Ok(count)
            }
            Err(e) => {
                warn!(store = T::NAME, error = %e, "Failed to load resources");
                self.store.patch(ResourcePatch {
                    status: Some(LoadStatus::Failed),
                    error: Some(Some(e.user_message())),
                    ..Default::default()
                });
                Err(e)
            }
        }
    }

    pub fn find(&self, id: i64) -> Option<T> {
        self.store
            .get_state()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Insert or replace by id. Returns `true` when the item was new.
    pub fn upsert(&self, item: T) -> bool {
        let id = item.id();
        let inserted = self.find(id).is_none();
        self.store.update(move |s| {
            match s.items.iter_mut().find(|existing| existing.id() == id) {
                Some(existing) => *existing = item,
                None => s.items.push(item),
            }
        });
        inserted
    }

    /// Remove by id. Returns `true` when an item was removed.
    pub fn remove(&self, id: i64) -> bool {
        self.store.update(move |s| s.items.retain(|item| item.id() != id))
    }

    /// Drop all items and the load status
    pub fn reset(&self) {
        self.store.replace(ResourceState::default());
    }
}

/// Equipment in the rental inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Fields this client does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for InventoryItem {
    const NAME: &'static str = "equipment";
    const ENDPOINT: &'static str = endpoints::INVENTORY_ITEMS;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Project {
    const NAME: &'static str = "projects";
    const ENDPOINT: &'static str = endpoints::PROJECTS;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource for Invoice {
    const NAME: &'static str = "invoices";
    const ENDPOINT: &'static str = endpoints::INVOICES;

    fn id(&self) -> i64 {
        self.id
    }
}

pub type EquipmentStore = ResourceStore<InventoryItem>;
pub type ProjectStore = ResourceStore<Project>;
pub type InvoiceStore = ResourceStore<Invoice>;

/// Outcome of loading every slice
#[derive(Debug)]
pub struct LoadReport {
    pub equipment: ApiResult<usize>,
    pub projects: ApiResult<usize>,
    pub invoices: ApiResult<usize>,
}

impl LoadReport {
    pub fn all_ok(&self) -> bool {
        self.equipment.is_ok() && self.projects.is_ok() && self.invoices.is_ok()
    }
}

/// The application's domain stores
#[derive(Clone, Default)]
pub struct DomainStores {
    pub equipment: EquipmentStore,
    pub projects: ProjectStore,
    pub invoices: InvoiceStore,
}

impl DomainStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every slice concurrently
    pub async fn load_all(&self, api: &ApiClient) -> LoadReport {
        let (equipment, projects, invoices) = futures::join!(
            self.equipment.load(api),
            self.projects.load(api),
            self.invoices.load(api)
        );
        LoadReport {
            equipment,
            projects,
            invoices,
        }
    }

    pub fn reset(&self) {
        self.equipment.reset();
        self.projects.reset();
        self.invoices.reset();
        debug!("Domain stores reset");
    }
}
