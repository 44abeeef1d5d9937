//! Integration tests for blocking prompts over the memory transport

use chatloop_core::events::EventHub;
use chatloop_core::interact::{prompt, InteractError, PromptOptions, Validator};
use chatloop_core::models::{ChannelId, Emoji, InboundEvent, Message, MessageId, Reaction, UserId};
use chatloop_core::transport::{CallKind, MemoryTransport, TransportCall};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const CHANNEL: ChannelId = ChannelId(42);
const USER: UserId = UserId(7);

struct Harness {
    transport: Arc<MemoryTransport>,
    hub: EventHub,
}

impl Harness {
    fn new() -> Self {
        Self {
            transport: Arc::new(MemoryTransport::new(UserId(1))),
            hub: EventHub::new(),
        }
    }

    fn spawn_prompt(&self, options: PromptOptions) -> JoinHandle<Result<Option<Message>, InteractError>> {
        let transport = Arc::clone(&self.transport);
        let hub = self.hub.clone();
        tokio::spawn(async move {
            prompt(transport.as_ref(), &hub, CHANNEL, USER, "Pick a number", options).await
        })
    }

    /// Id of the most recent message the bot sent
    fn prompt_id(&self) -> MessageId {
        match self.transport.calls_of(CallKind::Send).last() {
            Some(TransportCall::Send { message, .. }) => message.id,
            other => panic!("no prompt sent: {:?}", other),
        }
    }

    async fn say(&self, id: u64, channel: ChannelId, author: UserId, content: &str) {
        let message = Message::new(MessageId(id), channel, author, content);
        self.hub.dispatch(&InboundEvent::MessageCreated(message)).await;
    }

    async fn react(&self, message_id: MessageId, user_id: UserId, emoji: &str) {
        let reaction = Reaction {
            message_id,
            channel_id: CHANNEL,
            user_id,
            emoji: Emoji::from(emoji),
        };
        self.hub.dispatch(&InboundEvent::ReactionAdded(reaction)).await;
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

fn digits() -> Validator {
    Validator::new(|m: &Message| !m.content.is_empty() && m.content.chars().all(|c| c.is_ascii_digit()))
}

#[tokio::test(start_paused = true)]
async fn test_prompt_times_out_and_detaches() {
    let harness = Harness::new();
    let start = Instant::now();

    let answer = harness
        .spawn_prompt(PromptOptions::default().timeout(Duration::from_millis(200)))
        .await
        .unwrap()
        .unwrap();

    let elapsed = start.elapsed();
    assert!(answer.is_none());
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(210));

    // Nothing is left listening once the prompt is over
    assert_eq!(harness.hub.listener_count(), 0);
    let late = InboundEvent::MessageCreated(Message::new(MessageId(5_000), CHANNEL, USER, "1"));
    assert_eq!(harness.hub.dispatch(&late).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_valid_response_resolves_prompt() {
    let harness = Harness::new();
    let handle = harness.spawn_prompt(PromptOptions::default().validator(digits()));
    wait_for(|| harness.hub.listener_count() == 1).await;

    harness.say(5_000, CHANNEL, USER, "17").await;

    let answer = handle.await.unwrap().unwrap().expect("prompt should resolve");
    assert_eq!(answer.content, "17");
    assert_eq!(answer.id, MessageId(5_000));
    assert_eq!(harness.hub.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_responses_restart_timeout() {
    let harness = Harness::new();
    let start = Instant::now();
    let handle = harness.spawn_prompt(
        PromptOptions::default()
            .timeout(Duration::from_millis(200))
            .validator(digits()),
    );
    wait_for(|| harness.hub.listener_count() == 1).await;

    // Each rejection pushes the deadline out by the full timeout
    tokio::time::sleep(Duration::from_millis(150)).await;
    harness.say(5_000, CHANNEL, USER, "a").await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    harness.say(5_001, CHANNEL, USER, "b").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.say(5_002, CHANNEL, USER, "12").await;

    let answer = handle.await.unwrap().unwrap().expect("third response is valid");
    assert_eq!(answer.content, "12");

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(400));
    assert!(elapsed < Duration::from_millis(410));
}

#[tokio::test(start_paused = true)]
async fn test_digit_prompt_scenario() {
    let harness = Harness::new();
    let start = Instant::now();
    let handle = harness.spawn_prompt(
        PromptOptions::default()
            .timeout(Duration::from_secs(30))
            .validator(digits()),
    );
    wait_for(|| harness.hub.listener_count() == 1).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    harness.say(5_000, CHANNEL, USER, "a").await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    harness.say(5_001, CHANNEL, USER, "12").await;

    let answer = handle.await.unwrap().unwrap();
    assert_eq!(answer.map(|m| m.content), Some("12".to_string()));

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_millis(10_010));
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_messages_do_not_answer() {
    let harness = Harness::new();
    let handle = harness.spawn_prompt(PromptOptions::default().timeout(Duration::from_millis(200)));
    wait_for(|| harness.hub.listener_count() == 1).await;

    harness.say(5_000, ChannelId(43), USER, "1").await;
    harness.say(5_001, CHANNEL, UserId(8), "1").await;

    assert!(handle.await.unwrap().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reaction_returns_none() {
    let harness = Harness::new();
    let handle = harness.spawn_prompt(PromptOptions::default().cancel_reaction("❌"));
    wait_for(|| harness.transport.calls_of(CallKind::AddReaction).len() == 1).await;
    let prompt_id = harness.prompt_id();

    // Another user's press does nothing
    harness.react(prompt_id, UserId(8), "❌").await;
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());

    harness.react(prompt_id, USER, "❌").await;

    assert!(handle.await.unwrap().unwrap().is_none());
    assert_eq!(harness.hub.listener_count(), 0);
    assert_eq!(
        harness.transport.calls_of(CallKind::RemoveAllReactions),
        vec![TransportCall::RemoveAllReactions { message_id: prompt_id }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_clean_deletes_prompt_and_responses() {
    let harness = Harness::new();
    let handle = harness.spawn_prompt(PromptOptions::default().validator(digits()).clean(true));
    wait_for(|| harness.hub.listener_count() == 1).await;
    let prompt_id = harness.prompt_id();

    harness.say(5_000, CHANNEL, USER, "nope").await;
    harness.say(5_001, CHANNEL, USER, "3").await;

    let answer = handle.await.unwrap().unwrap();
    assert_eq!(answer.map(|m| m.content), Some("3".to_string()));

    let deleted: Vec<MessageId> = harness
        .transport
        .calls_of(CallKind::Delete)
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::Delete { message_id } => Some(message_id),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec![prompt_id, MessageId(5_000), MessageId(5_001)]);
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_propagates() {
    let harness = Harness::new();
    harness.transport.fail_on(CallKind::Send);

    let result = harness
        .spawn_prompt(PromptOptions::default().timeout(Duration::from_secs(1)))
        .await
        .unwrap();

    assert!(matches!(result, Err(InteractError::Transport(_))));
    assert_eq!(harness.hub.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_prompts_are_independent() {
    let harness = Harness::new();
    let transport = Arc::clone(&harness.transport);
    let hub = harness.hub.clone();
    let other = tokio::spawn(async move {
        prompt(transport.as_ref(), &hub, CHANNEL, UserId(8), "You too", PromptOptions::default()).await
    });
    let mine = harness.spawn_prompt(PromptOptions::default());
    wait_for(|| harness.hub.listener_count() == 2).await;

    harness.say(5_000, CHANNEL, UserId(8), "theirs").await;
    harness.say(5_001, CHANNEL, USER, "mine").await;

    let mine = mine.await.unwrap().unwrap().unwrap();
    let other = other.await.unwrap().unwrap().unwrap();
    assert_eq!(mine.content, "mine");
    assert_eq!(other.content, "theirs");
}

#[tokio::test(start_paused = true)]
async fn test_failed_cancel_reaction_still_cleans_prompt() {
    let harness = Harness::new();
    harness.transport.fail_on(CallKind::AddReaction);

    let result = harness
        .spawn_prompt(
            PromptOptions::default()
                .timeout(Duration::from_secs(1))
                .cancel_reaction("❌")
                .clean(true),
        )
        .await
        .unwrap();

    assert!(matches!(result, Err(InteractError::Transport(_))));
    assert_eq!(
        harness.transport.calls_of(CallKind::Delete),
        vec![TransportCall::Delete {
            message_id: harness.prompt_id()
        }]
    );
    assert_eq!(harness.hub.listener_count(), 0);
}

/// Deterministic jitter source
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

async fn settle(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition never became true");
        tokio::time::sleep(Duration::from_micros(100)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_racing_timeout_has_one_outcome() {
    let mut jitter = XorShift(0x9E37_79B9_7F4A_7C15);
    for trial in 0..200 {
        let harness = Harness::new();
        let handle = harness.spawn_prompt(
            PromptOptions::default()
                .timeout(Duration::from_millis(3))
                .cancel_reaction("❌"),
        );
        settle(|| harness.transport.calls_of(CallKind::AddReaction).len() == 1).await;
        let prompt_id = harness.prompt_id();

        // Lands anywhere from well before to well after the deadline
        tokio::time::sleep(Duration::from_micros(1_000 + jitter.next() % 4_000)).await;
        harness.react(prompt_id, USER, "❌").await;

        let answer = handle.await.unwrap().unwrap();
        assert!(answer.is_none(), "trial {}", trial);
        assert_eq!(harness.hub.listener_count(), 0, "trial {}", trial);

        // No timer fires after the prompt is over
        let calls = harness.transport.calls().len();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(harness.transport.calls().len(), calls, "trial {}", trial);
        assert_eq!(
            harness.transport.calls_of(CallKind::RemoveAllReactions).len(),
            1,
            "trial {}",
            trial
        );
    }
}
