//! In-memory caches of server entities.
//!
//! Every mutating operation calls the server first and touches the local
//! list only after a confirmed response; nothing is inserted speculatively,
//! so a failure has nothing to roll back.
//!
//! A full fetch replaces the list outright. A response that is not a list of
//! the expected entity resets the list to empty and records an error instead
//! of failing the call. CourseFiltering wraps its lists in a one-field object
//! (`{courses: [...]}`); those are unwrapped, and a bare list is accepted too.

mod courses;
mod filters;
mod schedules;
mod sections;

pub use courses::CourseCache;
pub use filters::FilterCache;
pub use schedules::ScheduleCache;
pub use sections::SectionCache;

use std::borrow::Cow;
use std::sync::Mutex;

use planner_protocol::{Course, Endpoint, FilteredCourse, Schedule, Section, Tag};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PlannerError, Result};
use crate::lock;
use crate::status::OperationStatus;

/// Identity of a cached entity within its list.
pub trait Keyed {
    fn key(&self) -> Cow<'_, str>;
}

impl Keyed for Course {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }
}

impl Keyed for Section {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }
}

impl Keyed for Schedule {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }
}

impl Keyed for Tag {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }
}

impl Keyed for FilteredCourse {
    fn key(&self) -> Cow<'_, str> {
        Cow::Owned(FilteredCourse::key(self))
    }
}

/// Ordered list with unique keys.
#[derive(Debug)]
pub struct ResourceList<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Keyed + Clone> ResourceList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<T> {
        lock(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    pub fn get(&self, key: &str) -> Option<T> {
        lock(&self.items)
            .iter()
            .find(|item| item.key() == key)
            .cloned()
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        lock(&self.items)
            .iter()
            .filter(|item| predicate(*item))
            .cloned()
            .collect()
    }

    /// Replaces the whole list, keeping server order. A key the server
    /// repeats keeps its first position and its last value.
    pub fn replace_all(&self, fresh: Vec<T>) {
        let mut deduped: Vec<T> = Vec::with_capacity(fresh.len());
        for item in fresh {
            match deduped.iter().position(|existing| existing.key() == item.key()) {
                Some(index) => deduped[index] = item,
                None => deduped.push(item),
            }
        }
        *lock(&self.items) = deduped;
    }

    /// Replaces the entry with the same key in place, or appends.
    pub fn upsert(&self, item: T) {
        let mut items = lock(&self.items);
        match items.iter().position(|existing| existing.key() == item.key()) {
            Some(index) => items[index] = item,
            None => items.push(item),
        }
    }

    /// Applies `change` to the entry with `key`. Returns false if absent.
    pub fn update<F>(&self, key: &str, change: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let mut items = lock(&self.items);
        match items.iter_mut().find(|item| item.key() == key) {
            Some(item) => {
                change(item);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut items = lock(&self.items);
        let before = items.len();
        items.retain(|item| item.key() != key);
        items.len() != before
    }

    pub fn clear(&self) {
        lock(&self.items).clear();
    }
}

pub(crate) fn decode_list<T: DeserializeOwned>(endpoint: Endpoint, value: Value) -> Result<Vec<T>> {
    if !value.is_array() {
        return Err(PlannerError::shape(endpoint, "expected a list"));
    }
    crate::transport::decode(endpoint, value)
}

/// Decodes a list sent either bare or inside the endpoint's envelope `E`.
pub(crate) fn decode_enveloped<T, E>(endpoint: Endpoint, value: Value) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    E: DeserializeOwned + Into<Vec<T>>,
{
    if value.is_array() {
        return decode_list(endpoint, value);
    }
    if !value.is_object() {
        return Err(PlannerError::shape(endpoint, "expected a list"));
    }
    crate::transport::decode::<E>(endpoint, value).map(Into::into)
}

/// Installs a full-fetch response, degrading a malformed one to an empty
/// list plus a recorded error.
pub(crate) fn apply_full_fetch<T>(
    list: &ResourceList<T>,
    status: &OperationStatus,
    endpoint: Endpoint,
    value: Value,
) where
    T: Keyed + Clone + DeserializeOwned,
{
    install(list, status, endpoint, decode_list(endpoint, value));
}

/// Same as [`apply_full_fetch`] for endpoints that wrap the list in `E`.
pub(crate) fn apply_enveloped_fetch<T, E>(
    list: &ResourceList<T>,
    status: &OperationStatus,
    endpoint: Endpoint,
    value: Value,
) where
    T: Keyed + Clone + DeserializeOwned,
    E: DeserializeOwned + Into<Vec<T>>,
{
    install(list, status, endpoint, decode_enveloped::<T, E>(endpoint, value));
}

fn install<T: Keyed + Clone>(
    list: &ResourceList<T>,
    status: &OperationStatus,
    endpoint: Endpoint,
    decoded: Result<Vec<T>>,
) {
    match decoded {
        Ok(items) => list.replace_all(items),
        Err(err) => {
            tracing::warn!(error = %err, endpoint = %endpoint, "Malformed list response, resetting cache");
            list.clear();
            status.set_error(err.to_string());
        }
    }
}
