//! The conversation orchestrator.
//!
//! For each inbound request it decides one of three paths: create a new
//! conversation, append to an existing one, or rewind/regenerate from a
//! point in history — then hands the prepared history to the researcher.

use chrono::Utc;
use periscope_core::error::{Error, OrchestratorError};
use periscope_core::event::{DomainEvent, EventBus};
use periscope_core::message::{Chat, ChatId, Message, MessageId, Role, UserId};
use periscope_storage::ChatStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const MAX_DERIVED_TITLE: usize = 80;

/// What the inbound request is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// A new user message (first or subsequent).
    Submit,
    /// Rewind to a target message and regenerate from there.
    Regenerate,
}

/// An inbound conversation request.
#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub trigger: TriggerKind,
    /// The inbound user message (the edited message for a user-target
    /// regeneration; ignored for an assistant-target one).
    pub message: Message,
    pub target_message_id: Option<MessageId>,
    /// Already-loaded history, if the caller has one; avoids a re-read.
    pub snapshot: Option<Vec<Message>>,
}

/// The prepared history plus, for the new-conversation path, the in-flight
/// persistence handle.
#[derive(Debug)]
pub struct Prepared {
    pub messages: Vec<Message>,
    pub save: Option<SaveHandle>,
}

/// An awaitable handle on a background persistence task.
///
/// The caller may await it before finalizing a response or drop it to let
/// persistence finish on its own; failures surface here, never swallowed.
#[derive(Debug)]
pub struct SaveHandle(JoinHandle<Result<(), Error>>);

impl SaveHandle {
    pub fn new(handle: JoinHandle<Result<(), Error>>) -> Self {
        Self(handle)
    }

    pub async fn wait(self) -> Result<(), Error> {
        match self.0.await {
            Ok(result) => result,
            Err(e) => Err(Error::Orchestrator(OrchestratorError::SaveFailed(
                e.to_string(),
            ))),
        }
    }
}

/// The orchestrator.
pub struct Orchestrator {
    store: Arc<ChatStore>,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(store: Arc<ChatStore>, event_bus: Arc<EventBus>) -> Self {
        Self { store, event_bus }
    }

    /// Decide the path for an inbound request and prepare the history the
    /// researcher will generate against.
    pub async fn prepare(&self, request: PrepareRequest) -> Result<Prepared, Error> {
        match request.trigger {
            TriggerKind::Submit => self.prepare_submit(request).await,
            TriggerKind::Regenerate => self.prepare_regenerate(request).await,
        }
    }

    async fn prepare_submit(&self, request: PrepareRequest) -> Result<Prepared, Error> {
        if !self.store.chat_exists(&request.chat_id).await? {
            return self.prepare_new_chat(request);
        }

        // Existing conversation: extend the snapshot in memory when we have
        // one, otherwise read history from storage.
        let mut messages = match request.snapshot {
            Some(snapshot) => snapshot,
            None => {
                self.store
                    .load_messages(&request.user_id, &request.chat_id)
                    .await?
            }
        };

        self.store
            .upsert_message(&request.user_id, &request.message)
            .await?;
        self.event_bus.publish(DomainEvent::MessageSaved {
            chat_id: request.chat_id.to_string(),
            message_id: request.message.id.to_string(),
            part_count: request.message.parts.len(),
            timestamp: Utc::now(),
        });

        // Mirror the upsert in memory: same id replaces, never duplicates.
        messages.retain(|m| m.id != request.message.id);
        messages.push(request.message);
        Ok(Prepared {
            messages,
            save: None,
        })
    }

    /// New conversation: chat and first message persist together in the
    /// background; the caller gets the message back immediately and may
    /// await the handle before finalizing its response.
    fn prepare_new_chat(&self, request: PrepareRequest) -> Result<Prepared, Error> {
        let title = derive_title(&request.message);
        let mut chat = Chat::new(request.user_id.clone(), title);
        chat.id = request.chat_id.clone();

        info!(chat_id = %chat.id, "Creating new conversation");
        self.event_bus.publish(DomainEvent::ChatCreated {
            chat_id: chat.id.to_string(),
            user_id: chat.user_id.to_string(),
            timestamp: Utc::now(),
        });

        let store = Arc::clone(&self.store);
        let user_id = request.user_id.clone();
        let message = request.message.clone();
        let handle = tokio::spawn(async move {
            store.create_chat(&chat).await?;
            store.upsert_message(&user_id, &message).await?;
            Ok(())
        });

        Ok(Prepared {
            messages: vec![request.message],
            save: Some(SaveHandle(handle)),
        })
    }

    async fn prepare_regenerate(&self, request: PrepareRequest) -> Result<Prepared, Error> {
        let history = match request.snapshot {
            Some(snapshot) => snapshot,
            None => {
                self.store
                    .load_messages(&request.user_id, &request.chat_id)
                    .await?
            }
        };

        let by_id = request
            .target_message_id
            .as_ref()
            .and_then(|id| history.iter().position(|m| m.id == *id));
        // Regeneration requests may reference a stale id after concurrent
        // edits; fall back to the most recent message by position.
        let index = by_id.or_else(|| fallback_target(&history)).ok_or_else(|| {
            OrchestratorError::MessageNotFound {
                chat_id: request.chat_id.to_string(),
            }
        })?;

        let target = history[index].clone();
        debug!(
            chat_id = %request.chat_id,
            target = %target.id,
            role = target.role.as_str(),
            by_id = by_id.is_some(),
            "Regenerating"
        );

        match target.role {
            Role::Assistant => {
                // Delete the target and everything after it; the researcher
                // regenerates from the truncated history.
                let ids: Vec<MessageId> = history[index..].iter().map(|m| m.id.clone()).collect();
                self.store
                    .delete_messages(&request.user_id, &request.chat_id, &ids)
                    .await?;
                Ok(Prepared {
                    messages: history[..index].to_vec(),
                    save: None,
                })
            }
            Role::User => {
                // Edit-and-resubmit: persist the edit in place, drop
                // everything strictly after it.
                let mut edited = request.message.clone();
                edited.id = target.id.clone();
                edited.chat_id = request.chat_id.clone();
                edited.created_at = target.created_at;
                edited.updated_at = Utc::now();
                self.store
                    .upsert_message(&request.user_id, &edited)
                    .await?;
                self.event_bus.publish(DomainEvent::MessageSaved {
                    chat_id: request.chat_id.to_string(),
                    message_id: edited.id.to_string(),
                    part_count: edited.parts.len(),
                    timestamp: Utc::now(),
                });

                let after: Vec<MessageId> = history[index + 1..]
                    .iter()
                    .map(|m| m.id.clone())
                    .collect();
                self.store
                    .delete_messages(&request.user_id, &request.chat_id, &after)
                    .await?;

                // Re-read for consistency after the delete; fall back to the
                // in-memory truncation only if the re-read yields nothing.
                let refreshed = self
                    .store
                    .load_messages(&request.user_id, &request.chat_id)
                    .await?;
                if refreshed.is_empty() {
                    let mut messages = history[..index].to_vec();
                    messages.push(edited);
                    Ok(Prepared {
                        messages,
                        save: None,
                    })
                } else {
                    Ok(Prepared {
                        messages: refreshed,
                        save: None,
                    })
                }
            }
        }
    }
}

/// Positional fallback: `max(last assistant index, last user index)`.
fn fallback_target(history: &[Message]) -> Option<usize> {
    let last_assistant = history.iter().rposition(|m| m.role == Role::Assistant);
    let last_user = history.iter().rposition(|m| m.role == Role::User);
    match (last_assistant, last_user) {
        (Some(a), Some(u)) => Some(a.max(u)),
        (a, u) => a.or(u),
    }
}

fn derive_title(message: &Message) -> String {
    let text = message.text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "New conversation".into();
    }
    let mut title: String = trimmed.chars().take(MAX_DERIVED_TITLE).collect();
    if title.len() < trimmed.len() {
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use periscope_core::part::Part;

    async fn setup() -> (Orchestrator, Arc<ChatStore>, UserId) {
        let store = Arc::new(ChatStore::new(":memory:").await.unwrap());
        let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::new(EventBus::default()));
        (orchestrator, store, UserId::from("u1"))
    }

    fn submit(chat_id: &ChatId, user_id: &UserId, message: Message) -> PrepareRequest {
        PrepareRequest {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
            trigger: TriggerKind::Submit,
            message,
            target_message_id: None,
            snapshot: None,
        }
    }

    fn regenerate(
        chat_id: &ChatId,
        user_id: &UserId,
        message: Message,
        target: Option<MessageId>,
    ) -> PrepareRequest {
        PrepareRequest {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
            trigger: TriggerKind::Regenerate,
            message,
            target_message_id: target,
            snapshot: None,
        }
    }

    /// Seed a chat with alternating user/assistant messages, spaced apart
    /// so created_at ordering is unambiguous.
    async fn seed(
        store: &ChatStore,
        user_id: &UserId,
        chat_id: &ChatId,
        texts: &[(&str, Role)],
    ) -> Vec<Message> {
        let chat = {
            let mut c = Chat::new(user_id.clone(), "seeded");
            c.id = chat_id.clone();
            c
        };
        store.create_chat(&chat).await.unwrap();

        let base = Utc::now() - chrono::Duration::seconds(texts.len() as i64);
        let mut messages = Vec::new();
        for (i, (text, role)) in texts.iter().enumerate() {
            let mut msg = match role {
                Role::User => Message::user(chat_id.clone(), *text),
                Role::Assistant => Message::assistant(
                    chat_id.clone(),
                    vec![Part::Text {
                        text: (*text).into(),
                    }],
                ),
            };
            msg.created_at = base + chrono::Duration::seconds(i as i64);
            store.upsert_message(user_id, &msg).await.unwrap();
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn new_conversation_returns_immediately_with_save_handle() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        let message = Message::user(chat_id.clone(), "What is ownership in Rust?");

        let prepared = orchestrator
            .prepare(submit(&chat_id, &user, message.clone()))
            .await
            .unwrap();

        assert_eq!(prepared.messages.len(), 1);
        assert_eq!(prepared.messages[0].id, message.id);

        // Await the in-flight persistence and verify it landed.
        prepared.save.unwrap().wait().await.unwrap();
        let chat = store.get_chat(&user, &chat_id).await.unwrap().unwrap();
        assert_eq!(chat.title, "What is ownership in Rust?");
        let history = store.load_messages(&user, &chat_id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn append_returns_full_history() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        seed(
            &store,
            &user,
            &chat_id,
            &[("first", Role::User), ("reply", Role::Assistant)],
        )
        .await;

        let message = Message::user(chat_id.clone(), "follow-up");
        let prepared = orchestrator
            .prepare(submit(&chat_id, &user, message.clone()))
            .await
            .unwrap();

        assert!(prepared.save.is_none());
        assert_eq!(prepared.messages.len(), 3);
        assert_eq!(prepared.messages[2].id, message.id);

        let history = store.load_messages(&user, &chat_id).await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn append_with_snapshot_extends_in_memory() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        let seeded = seed(&store, &user, &chat_id, &[("first", Role::User)]).await;

        let message = Message::user(chat_id.clone(), "second");
        let mut request = submit(&chat_id, &user, message.clone());
        request.snapshot = Some(seeded.clone());

        let prepared = orchestrator.prepare(request).await.unwrap();
        assert_eq!(prepared.messages.len(), 2);
        assert_eq!(prepared.messages[0].id, seeded[0].id);
        assert_eq!(prepared.messages[1].id, message.id);
    }

    #[tokio::test]
    async fn append_same_id_replaces_in_memory() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        let seeded = seed(&store, &user, &chat_id, &[("first", Role::User)]).await;

        // Re-submit the same message id with edited content.
        let mut message = seeded[0].clone();
        message.parts = vec![Part::Text {
            text: "first, edited".into(),
        }];
        let prepared = orchestrator
            .prepare(submit(&chat_id, &user, message))
            .await
            .unwrap();

        assert_eq!(prepared.messages.len(), 1);
        assert_eq!(prepared.messages[0].text(), "first, edited");
    }

    #[tokio::test]
    async fn regenerate_assistant_target_truncates_before_it() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        let seeded = seed(
            &store,
            &user,
            &chat_id,
            &[
                ("user1", Role::User),
                ("assistant1", Role::Assistant),
                ("user2", Role::User),
                ("assistant2", Role::Assistant),
            ],
        )
        .await;

        let prepared = orchestrator
            .prepare(regenerate(
                &chat_id,
                &user,
                Message::user(chat_id.clone(), "ignored"),
                Some(seeded[3].id.clone()),
            ))
            .await
            .unwrap();

        let ids: Vec<_> = prepared.messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(
            ids,
            vec![seeded[0].id.clone(), seeded[1].id.clone(), seeded[2].id.clone()]
        );

        // assistant2 is gone from storage too.
        let history = store.load_messages(&user, &chat_id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|m| m.id != seeded[3].id));
    }

    #[tokio::test]
    async fn regenerate_user_target_persists_edit_and_deletes_after() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        let seeded = seed(
            &store,
            &user,
            &chat_id,
            &[("user1", Role::User), ("assistant1", Role::Assistant)],
        )
        .await;

        let edited = Message::user(chat_id.clone(), "user1, edited");
        let prepared = orchestrator
            .prepare(regenerate(
                &chat_id,
                &user,
                edited,
                Some(seeded[0].id.clone()),
            ))
            .await
            .unwrap();

        assert_eq!(prepared.messages.len(), 1);
        assert_eq!(prepared.messages[0].id, seeded[0].id, "edited in place");
        assert_eq!(prepared.messages[0].text(), "user1, edited");

        let history = store.load_messages(&user, &chat_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text(), "user1, edited");
    }

    #[tokio::test]
    async fn stale_target_id_falls_back_to_last_message() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        let seeded = seed(
            &store,
            &user,
            &chat_id,
            &[
                ("user1", Role::User),
                ("assistant1", Role::Assistant),
                ("user2", Role::User),
                ("assistant2", Role::Assistant),
            ],
        )
        .await;

        let prepared = orchestrator
            .prepare(regenerate(
                &chat_id,
                &user,
                Message::user(chat_id.clone(), "ignored"),
                Some(MessageId::from("no-such-id")),
            ))
            .await
            .unwrap();

        // The positional fallback picks assistant2 (the last message).
        assert_eq!(prepared.messages.len(), 3);
        assert!(prepared.messages.iter().all(|m| m.id != seeded[3].id));
    }

    #[tokio::test]
    async fn regenerate_empty_chat_is_fatal() {
        let (orchestrator, store, user) = setup().await;
        let chat_id = ChatId::new();
        seed(&store, &user, &chat_id, &[]).await;

        let err = orchestrator
            .prepare(regenerate(
                &chat_id,
                &user,
                Message::user(chat_id.clone(), "x"),
                None,
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Orchestrator(OrchestratorError::MessageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn save_handle_surfaces_task_errors() {
        let handle: JoinHandle<Result<(), Error>> = tokio::spawn(async {
            Err(Error::Internal("disk full".into()))
        });
        let err = SaveHandle::new(handle).wait().await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn fallback_picks_deepest_of_last_roles() {
        let chat_id = ChatId::new();
        let history = vec![
            Message::user(chat_id.clone(), "u1"),
            Message::assistant(chat_id.clone(), vec![]),
            Message::user(chat_id.clone(), "u2"),
        ];
        // last user (index 2) is deeper than last assistant (index 1)
        assert_eq!(fallback_target(&history), Some(2));
        assert_eq!(fallback_target(&[]), None);
    }

    #[test]
    fn title_derivation_truncates() {
        let chat_id = ChatId::new();
        let long = "x".repeat(200);
        let message = Message::user(chat_id.clone(), long);
        let title = derive_title(&message);
        assert!(title.chars().count() <= MAX_DERIVED_TITLE + 1);
        assert!(title.ends_with('…'));

        let empty = Message::user(chat_id, "   ");
        assert_eq!(derive_title(&empty), "New conversation");
    }
}
