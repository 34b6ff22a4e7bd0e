//! In-memory storage backends
//!
//! Process-local implementations of the storage contracts. They back the
//! test suite and single-process development runs; production uses the
//! PostgreSQL backends.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::ManagerDefinition;
use crate::error::{Error, Result};
use crate::logging::ExecutionLogDoc;

use super::{
    CatalogStore, ClaimedJob, ConversationMessage, ConversationStore, ExecutionLogStore,
    JobPayload, JobQueue, LongTermMemoryStore, MemoryHit, MemoryPoint, SessionMessages,
    UserRecord,
};

/// In-memory conversation log
#[derive(Default)]
pub struct InMemoryConversationStore {
    messages: Mutex<Vec<ConversationMessage>>,
}

impl InMemoryConversationStore {
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, message: ConversationMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn recent(&self, session_id: &str, n: usize) -> Result<Vec<ConversationMessage>> {
        let all = self.history(session_id).await?;
        let start = all.len().saturating_sub(n);
        Ok(all[start..].to_vec())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ConversationMessage>> {
        let mut msgs: Vec<ConversationMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        msgs.sort_by_key(|m| m.timestamp);
        Ok(msgs)
    }

    async fn clear_session(&self, session_id: &str) -> Result<u64> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.session_id != session_id);
        Ok((before - messages.len()) as u64)
    }

    async fn sessions_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionMessages>> {
        let messages = self.messages.lock().unwrap();
        let mut by_session: HashMap<String, Vec<ConversationMessage>> = HashMap::new();
        for m in messages.iter() {
            by_session
                .entry(m.session_id.clone())
                .or_default()
                .push(m.clone());
        }

        let mut sessions = Vec::new();
        for (session_id, mut msgs) in by_session {
            msgs.sort_by_key(|m| m.timestamp);
            let last = msgs.last().map(|m| m.timestamp);
            if matches!(last, Some(ts) if ts < cutoff) {
                sessions.push(SessionMessages {
                    session_id,
                    user_id: msgs[0].user_id.clone(),
                    messages: msgs,
                });
            }
        }
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn delete_sessions(&self, session_ids: &[String]) -> Result<u64> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| !session_ids.contains(&m.session_id));
        Ok((before - messages.len()) as u64)
    }
}

/// In-memory execution-log store
#[derive(Default)]
pub struct InMemoryExecutionLogStore {
    docs: Mutex<Vec<ExecutionLogDoc>>,
}

impl InMemoryExecutionLogStore {
    pub fn docs(&self) -> Vec<ExecutionLogDoc> {
        self.docs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionLogStore for InMemoryExecutionLogStore {
    async fn insert(&self, doc: &ExecutionLogDoc) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        if docs.iter().any(|d| d.execution_id == doc.execution_id) {
            return Err(Error::Internal(format!(
                "duplicate execution_id {}",
                doc.execution_id
            )));
        }
        docs.push(doc.clone());
        Ok(())
    }

    async fn latest_for_session(&self, session_id: &str) -> Result<Option<ExecutionLogDoc>> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .iter()
            .filter(|d| d.session_id == session_id)
            .max_by_key(|d| d.start_timestamp)
            .cloned())
    }
}

/// In-memory catalog store
#[derive(Default)]
pub struct InMemoryCatalogStore {
    users: Mutex<HashMap<String, UserRecord>>,
    managers: Mutex<HashMap<String, Vec<ManagerDefinition>>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalogStore {
    pub fn put_user(&self, user: UserRecord) {
        self.users
            .lock()
            .unwrap()
            .insert(user.username.clone(), user);
    }

    pub fn put_project_managers(&self, project: &str, managers: Vec<ManagerDefinition>) {
        self.managers
            .lock()
            .unwrap()
            .insert(project.to_string(), managers);
    }

    /// Simulate an unreachable catalog backend
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::Internal("catalog store unreachable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.check_available()?;
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn fetch_managers_for_projects(
        &self,
        projects: &[String],
    ) -> Result<Vec<ManagerDefinition>> {
        self.check_available()?;
        let managers = self.managers.lock().unwrap();
        let mut out = Vec::new();
        for project in projects {
            if let Some(defs) = managers.get(project) {
                out.extend(defs.iter().filter(|m| m.active).cloned());
            }
        }
        Ok(out)
    }
}

/// In-memory long-term-memory store with brute-force cosine search
#[derive(Default)]
pub struct InMemoryLongTermMemoryStore {
    points: Mutex<Vec<MemoryPoint>>,
}

impl InMemoryLongTermMemoryStore {
    pub fn points(&self) -> Vec<MemoryPoint> {
        self.points.lock().unwrap().clone()
    }
}

#[async_trait]
impl LongTermMemoryStore for InMemoryLongTermMemoryStore {
    async fn upsert(&self, points: Vec<MemoryPoint>) -> Result<()> {
        self.points.lock().unwrap().extend(points);
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<MemoryHit>> {
        let points = self.points.lock().unwrap();
        let mut hits: Vec<MemoryHit> = points
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| MemoryHit {
                summary: p.summary.clone(),
                conversation_end: p.conversation_end,
                score: cosine_similarity(&p.embedding, embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

struct QueuedJob {
    id: Uuid,
    payload: JobPayload,
    attempts: u32,
    claimed: bool,
}

/// In-memory at-least-once job queue
pub struct InMemoryJobQueue {
    queue: Mutex<VecDeque<QueuedJob>>,
    dead: Mutex<Vec<JobPayload>>,
    max_retries: u32,
}

impl InMemoryJobQueue {
    pub fn new(max_retries: u32) -> Self {
        InMemoryJobQueue {
            queue: Mutex::new(VecDeque::new()),
            dead: Mutex::new(Vec::new()),
            max_retries,
        }
    }

    pub fn dead_letters(&self) -> Vec<JobPayload> {
        self.dead.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, payload: &JobPayload) -> Result<()> {
        self.queue.lock().unwrap().push_back(QueuedJob {
            id: Uuid::new_v4(),
            payload: payload.clone(),
            attempts: 0,
            claimed: false,
        });
        Ok(())
    }

    async fn claim(&self) -> Result<Option<ClaimedJob>> {
        let mut queue = self.queue.lock().unwrap();
        let Some(job) = queue.iter_mut().find(|j| !j.claimed) else {
            return Ok(None);
        };
        job.claimed = true;
        job.attempts += 1;
        Ok(Some(ClaimedJob {
            id: job.id,
            payload: job.payload.clone(),
            attempts: job.attempts,
        }))
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        self.queue.lock().unwrap().retain(|j| j.id != job_id);
        Ok(())
    }

    async fn fail(&self, job_id: Uuid) -> Result<()> {
        let mut queue = self.queue.lock().unwrap();
        if let Some(pos) = queue.iter().position(|j| j.id == job_id) {
            if queue[pos].attempts >= self.max_retries {
                if let Some(job) = queue.remove(pos) {
                    self.dead.lock().unwrap().push(job.payload);
                }
            } else {
                queue[pos].claimed = false;
            }
        }
        Ok(())
    }
}
