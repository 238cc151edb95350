//! Conversation view state
//!
//! Messaging has no push channel, so the open thread and the inbox are
//! refreshed by polling.

use std::time::{Duration, Instant};

use super::{ApiClient, ChatMessage, ClientError};

/// How often an open thread is refreshed
pub const THREAD_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// How often the conversation list is refreshed
pub const INBOX_POLL_INTERVAL: Duration = Duration::from_secs(15);

const THREAD_PAGE_SIZE: i64 = 100;

/// Fixed-interval poll timer
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    last: Option<Instant>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn thread() -> Self {
        Self::new(THREAD_POLL_INTERVAL)
    }

    pub fn inbox() -> Self {
        Self::new(INBOX_POLL_INTERVAL)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Never polled, or the interval has elapsed since the last poll
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Force the next [`is_due`](Self::is_due) to return true.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    NoConversation,
    Loading { other_id: i64 },
    Loaded { other_id: i64 },
}

/// The currently open direct-message thread
#[derive(Debug)]
pub struct ThreadView {
    state: ThreadState,
    messages: Vec<ChatMessage>,
    poller: Poller,
}

impl Default for ThreadView {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadView {
    pub fn new() -> Self {
        Self {
            state: ThreadState::NoConversation,
            messages: Vec::new(),
            poller: Poller::thread(),
        }
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn other_id(&self) -> Option<i64> {
        match self.state {
            ThreadState::NoConversation => None,
            ThreadState::Loading { other_id } | ThreadState::Loaded { other_id } => Some(other_id),
        }
    }

    /// Switch to the thread with `other_id`. Previous messages are dropped.
    pub fn open(&mut self, other_id: i64) {
        self.state = ThreadState::Loading { other_id };
        self.messages.clear();
        self.poller.reset();
    }

    pub fn close(&mut self) {
        self.state = ThreadState::NoConversation;
        self.messages.clear();
        self.poller.reset();
    }

    /// Replace the thread contents with a freshly fetched page.
    ///
    /// Ignored if the view moved to another conversation meanwhile.
    pub fn apply_messages(&mut self, other_id: i64, messages: Vec<ChatMessage>, now: Instant) {
        if self.other_id() != Some(other_id) {
            return;
        }
        self.messages = messages;
        self.state = ThreadState::Loaded { other_id };
        self.poller.mark(now);
    }

    /// Append a message this client just sent, skipping duplicates.
    pub fn push_sent(&mut self, message: ChatMessage) {
        if !self.messages.iter().any(|m| m.id == message.id) {
            self.messages.push(message);
        }
    }

    pub fn needs_refresh(&self, now: Instant) -> bool {
        self.other_id().is_some() && self.poller.is_due(now)
    }

    /// Fetch the newest messages and mark them read.
    pub async fn refresh(&mut self, client: &ApiClient) -> Result<(), ClientError> {
        let Some(other_id) = self.other_id() else {
            return Ok(());
        };
        let messages = latest_messages(client, other_id).await?;
        self.apply_messages(other_id, messages, Instant::now());
        client.mark_conversation_read(other_id).await?;
        Ok(())
    }

    /// Refresh only if the poll interval has elapsed.
    pub async fn poll(&mut self, client: &ApiClient) -> Result<(), ClientError> {
        if self.needs_refresh(Instant::now()) {
            self.refresh(client).await?;
        }
        Ok(())
    }

    /// Send `content` to the open thread, then refresh it.
    pub async fn send(&mut self, client: &ApiClient, content: &str) -> Result<(), ClientError> {
        let Some(other_id) = self.other_id() else {
            return Ok(());
        };
        let message = client.send_message(other_id, content).await?;
        self.push_sent(message);
        self.refresh(client).await
    }
}

/// The newest `THREAD_PAGE_SIZE` messages of a thread, oldest first.
///
/// Pages are numbered from the oldest message, so the tail is located from
/// `total` and topped up from the page before it when short.
async fn latest_messages(
    client: &ApiClient,
    other_id: i64,
) -> Result<Vec<ChatMessage>, ClientError> {
    let total = client.messages(other_id, 1, 1).await?.total;
    let last = last_page(total, THREAD_PAGE_SIZE);
    let mut messages = client
        .messages(other_id, last, THREAD_PAGE_SIZE)
        .await?
        .messages;

    if last > 1 && (messages.len() as i64) < THREAD_PAGE_SIZE {
        let mut earlier = client
            .messages(other_id, last - 1, THREAD_PAGE_SIZE)
            .await?
            .messages;
        earlier.append(&mut messages);
        messages = earlier;
    }
    // a delete between the two fetches shifts a message across the page boundary
    messages.dedup_by_key(|message| message.id);
    Ok(keep_newest(messages, THREAD_PAGE_SIZE as usize))
}

fn last_page(total: i64, limit: i64) -> i64 {
    ((total + limit - 1) / limit).max(1)
}

fn keep_newest(mut messages: Vec<ChatMessage>, count: usize) -> Vec<ChatMessage> {
    let excess = messages.len().saturating_sub(count);
    messages.drain(..excess);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: i64) -> ChatMessage {
        ChatMessage {
            id,
            conversation_id: 1,
            sender_id: 7,
            content: format!("message {id}"),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn poller_respects_interval() {
        let start = Instant::now();
        let mut poller = Poller::thread();
        assert!(poller.is_due(start));
        poller.mark(start);
        assert!(!poller.is_due(start + Duration::from_secs(5)));
        assert!(poller.is_due(start + Duration::from_secs(6)));
        assert_eq!(Poller::inbox().interval(), Duration::from_secs(15));
    }

    #[test]
    fn open_then_load() {
        let mut view = ThreadView::new();
        assert_eq!(view.state(), ThreadState::NoConversation);
        assert!(!view.needs_refresh(Instant::now()));

        view.open(42);
        assert_eq!(view.state(), ThreadState::Loading { other_id: 42 });
        assert!(view.needs_refresh(Instant::now()));

        let now = Instant::now();
        view.apply_messages(42, vec![message(1), message(2)], now);
        assert_eq!(view.state(), ThreadState::Loaded { other_id: 42 });
        assert_eq!(view.messages().len(), 2);
        assert!(!view.needs_refresh(now));
    }

    #[test]
    fn stale_page_for_other_thread_is_ignored() {
        let mut view = ThreadView::new();
        view.open(1);
        view.open(2);
        view.apply_messages(1, vec![message(1)], Instant::now());
        assert_eq!(view.state(), ThreadState::Loading { other_id: 2 });
        assert!(view.messages().is_empty());
    }

    #[test]
    fn push_sent_skips_duplicates() {
        let mut view = ThreadView::new();
        view.open(3);
        view.apply_messages(3, vec![message(1)], Instant::now());
        view.push_sent(message(2));
        view.push_sent(message(2));
        assert_eq!(view.messages().len(), 2);
    }

    #[test]
    fn close_clears_thread() {
        let mut view = ThreadView::new();
        view.open(3);
        view.push_sent(message(1));
        view.close();
        assert_eq!(view.state(), ThreadState::NoConversation);
        assert!(view.messages().is_empty());
        assert_eq!(view.other_id(), None);
    }

    #[test]
    fn last_page_locates_tail() {
        assert_eq!(last_page(0, 100), 1);
        assert_eq!(last_page(100, 100), 1);
        assert_eq!(last_page(101, 100), 2);
        assert_eq!(last_page(250, 100), 3);
    }

    #[test]
    fn keep_newest_drops_oldest() {
        let messages: Vec<ChatMessage> = (1..=5).map(message).collect();
        let kept = keep_newest(messages, 3);
        let ids: Vec<i64> = kept.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(keep_newest(vec![message(1)], 3).len(), 1);
    }
}
