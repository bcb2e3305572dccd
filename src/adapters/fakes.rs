//! In-memory stand-ins for the external CMS, VCS host, tracker, and
//! notification endpoint, used across the crate's tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapters::traits::{ChangeRequest, ChangeSpec, CmsClient, RevisionRequest, VcsHost};
use crate::error::FixError;
use crate::notify::{Notifier, NotifyEvent};
use crate::tracker::{Ticket, TicketTracker};

#[derive(Debug, Clone)]
struct RevisionRecord {
    entity_id: String,
    field: String,
    original: Option<String>,
    proposed: String,
    published: bool,
    discarded: bool,
}

#[derive(Default)]
pub struct InMemoryCms {
    entities: Mutex<BTreeMap<(String, String), String>>,
    revisions: Mutex<BTreeMap<String, RevisionRecord>>,
    counter: AtomicUsize,
    fail_create_with_conflict: AtomicBool,
}

impl InMemoryCms {
    pub fn add_entity(&self, target_type: &str, id: &str, body: &str) {
        self.entities
            .lock()
            .unwrap()
            .insert((target_type.to_string(), id.to_string()), body.to_string());
    }

    pub fn fail_next_create_with_conflict(&self) {
        self.fail_create_with_conflict.store(true, Ordering::SeqCst);
    }

    pub fn revision_count(&self) -> usize {
        self.revisions.lock().unwrap().len()
    }

    pub fn revision_field(&self, revision: &str) -> Option<String> {
        self.revisions
            .lock()
            .unwrap()
            .get(revision)
            .map(|r| r.field.clone())
    }

    pub fn is_published(&self, revision: &str) -> bool {
        self.revisions
            .lock()
            .unwrap()
            .get(revision)
            .map(|r| r.published)
            .unwrap_or(false)
    }

    pub fn is_discarded(&self, revision: &str) -> bool {
        self.revisions
            .lock()
            .unwrap()
            .get(revision)
            .map(|r| r.discarded)
            .unwrap_or(false)
    }
}

#[async_trait]
impl CmsClient for InMemoryCms {
    async fn fetch_entity(&self, target_type: &str, id: &str) -> Result<String, FixError> {
        let key = (target_type.to_string(), id.to_string());
        if self.entities.lock().unwrap().contains_key(&key) {
            Ok(id.to_string())
        } else {
            Err(FixError::TargetNotFound(format!("{}/{}", target_type, id)))
        }
    }

    async fn search_entities(
        &self,
        target_type: &str,
        text: &str,
    ) -> Result<Vec<String>, FixError> {
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|((ty, _), body)| ty == target_type && body.contains(text))
            .map(|((_, id), _)| id.clone())
            .collect())
    }

    async fn create_draft_revision(&self, request: &RevisionRequest) -> Result<String, FixError> {
        if self.fail_create_with_conflict.swap(false, Ordering::SeqCst) {
            return Err(FixError::Conflict(request.entity_id.clone()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("rev-{}", n);
        self.revisions.lock().unwrap().insert(
            reference.clone(),
            RevisionRecord {
                entity_id: request.entity_id.clone(),
                field: request.field_name.clone(),
                original: request.original.clone(),
                proposed: request.proposed.clone(),
                published: false,
                discarded: false,
            },
        );
        Ok(reference)
    }

    async fn publish_revision(&self, revision: &str) -> Result<(), FixError> {
        let mut revisions = self.revisions.lock().unwrap();
        let record = revisions
            .get_mut(revision)
            .ok_or_else(|| FixError::TargetNotFound(revision.to_string()))?;
        record.published = true;
        // Apply the revision so later searches see the published text.
        if let Some(original) = record.original.clone() {
            let proposed = record.proposed.clone();
            let entity_id = record.entity_id.clone();
            drop(revisions);
            let mut entities = self.entities.lock().unwrap();
            for ((_, id), body) in entities.iter_mut() {
                if *id == entity_id {
                    *body = body.replace(&original, &proposed);
                }
            }
        }
        Ok(())
    }

    async fn discard_revision(&self, revision: &str) -> Result<(), FixError> {
        let mut revisions = self.revisions.lock().unwrap();
        let record = revisions
            .get_mut(revision)
            .ok_or_else(|| FixError::TargetNotFound(revision.to_string()))?;
        record.discarded = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RequestState {
    Open,
    Merged,
    Closed,
}

pub struct InMemoryVcs {
    default_branch: String,
    branches: Mutex<BTreeSet<String>>,
    commits: Mutex<BTreeMap<String, Vec<ChangeSpec>>>,
    requests: Mutex<BTreeMap<String, (ChangeRequest, RequestState)>>,
    counter: AtomicUsize,
    merge_conflict: AtomicBool,
    unreachable: AtomicBool,
}

impl InMemoryVcs {
    pub fn new(default_branch: &str) -> Self {
        Self {
            default_branch: default_branch.to_string(),
            branches: Mutex::default(),
            commits: Mutex::default(),
            requests: Mutex::default(),
            counter: AtomicUsize::new(0),
            merge_conflict: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn fail_merges_with_conflict(&self) {
        self.merge_conflict.store(true, Ordering::SeqCst);
    }

    pub fn make_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.lock().unwrap().contains(name)
    }

    pub fn commit_count(&self, branch: &str) -> usize {
        self.commits
            .lock()
            .unwrap()
            .get(branch)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn open_request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .values()
            .filter(|(_, state)| *state == RequestState::Open)
            .count()
    }

    pub fn change_request(&self, reference: &str) -> Option<ChangeRequest> {
        self.requests
            .lock()
            .unwrap()
            .get(reference)
            .map(|(r, _)| r.clone())
    }

    pub fn is_merged(&self, reference: &str) -> bool {
        matches!(
            self.requests.lock().unwrap().get(reference),
            Some((_, RequestState::Merged))
        )
    }

    pub fn is_closed(&self, reference: &str) -> bool {
        matches!(
            self.requests.lock().unwrap().get(reference),
            Some((_, RequestState::Closed))
        )
    }

    pub fn merged_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .values()
            .filter(|(_, state)| *state == RequestState::Merged)
            .count()
    }

    fn check_reachable(&self) -> Result<(), FixError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(FixError::RepositoryAccess("host unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VcsHost for InMemoryVcs {
    async fn default_branch(&self) -> Result<String, FixError> {
        self.check_reachable()?;
        Ok(self.default_branch.clone())
    }

    async fn create_branch(&self, name: &str, _from: &str) -> Result<(), FixError> {
        self.check_reachable()?;
        self.branches.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn commit_change(&self, branch: &str, change: &ChangeSpec) -> Result<(), FixError> {
        self.check_reachable()?;
        self.commits
            .lock()
            .unwrap()
            .entry(branch.to_string())
            .or_default()
            .push(change.clone());
        Ok(())
    }

    async fn open_change_request(&self, request: &ChangeRequest) -> Result<String, FixError> {
        self.check_reachable()?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("pr-{}", n);
        self.requests
            .lock()
            .unwrap()
            .insert(reference.clone(), (request.clone(), RequestState::Open));
        Ok(reference)
    }

    async fn merge_change_request(&self, reference: &str) -> Result<(), FixError> {
        self.check_reachable()?;
        if self.merge_conflict.load(Ordering::SeqCst) {
            return Err(FixError::MergeConflict {
                base: self.default_branch.clone(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        let entry = requests
            .get_mut(reference)
            .ok_or_else(|| FixError::TargetNotFound(reference.to_string()))?;
        entry.1 = RequestState::Merged;
        Ok(())
    }

    async fn close_change_request(&self, reference: &str) -> Result<(), FixError> {
        self.check_reachable()?;
        let mut requests = self.requests.lock().unwrap();
        let entry = requests
            .get_mut(reference)
            .ok_or_else(|| FixError::TargetNotFound(reference.to_string()))?;
        entry.1 = RequestState::Closed;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTracker {
    tickets: Mutex<BTreeMap<String, Ticket>>,
    comments: Mutex<BTreeMap<String, Vec<String>>>,
    closed: Mutex<BTreeSet<String>>,
    counter: AtomicUsize,
}

impl RecordingTracker {
    pub fn ticket_count(&self) -> usize {
        self.tickets.lock().unwrap().len()
    }

    pub fn ticket(&self, reference: &str) -> Option<Ticket> {
        self.tickets.lock().unwrap().get(reference).cloned()
    }

    pub fn comments_for(&self, reference: &str) -> Vec<String> {
        self.comments
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_closed(&self, reference: &str) -> bool {
        self.closed.lock().unwrap().contains(reference)
    }
}

#[async_trait]
impl TicketTracker for RecordingTracker {
    async fn create_ticket(&self, ticket: &Ticket) -> Result<String, FixError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("ticket-{}", n);
        self.tickets
            .lock()
            .unwrap()
            .insert(reference.clone(), ticket.clone());
        Ok(reference)
    }

    async fn comment(&self, reference: &str, body: &str) -> Result<(), FixError> {
        self.comments
            .lock()
            .unwrap()
            .entry(reference.to_string())
            .or_default()
            .push(body.to_string());
        Ok(())
    }

    async fn close(&self, reference: &str) -> Result<(), FixError> {
        self.closed.lock().unwrap().insert(reference.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifyEvent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, event: &NotifyEvent) -> Result<(), FixError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FixError::Notification("endpoint down".to_string()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
