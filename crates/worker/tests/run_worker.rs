//! Black-box coverage of `run_worker` as the dispatcher/runtime would
//! observe it: video/channel ids are stamped correctly onto every
//! collected `Message`, and the worker is well-behaved.

use youtube_chat_archiver_core::capability::ChatEvent;
use youtube_chat_archiver_core::model::AuthorFlags;
use youtube_chat_archiver_testkit::{FakeLiveChatSourceFactory, InMemoryStateStore};

fn event(id: &str) -> ChatEvent {
    ChatEvent {
        platform_message_id: id.to_string(),
        author_name: "alice".into(),
        author_channel_id: "uc-alice".into(),
        body: "hi there".into(),
        datetime: time::OffsetDateTime::now_utc(),
        author_flags: AuthorFlags::default(),
    }
}

#[tokio::test]
async fn collected_messages_carry_the_worker_video_and_channel_ids() {
    let store = InMemoryStateStore::new();
    let factory = FakeLiveChatSourceFactory::new(vec![vec![event("m1"), event("m2")]]);

    youtube_chat_archiver_worker::run_worker(&store, &factory, "v1", "UCabc")
        .await
        .unwrap();

    let messages = store.all_messages().await;
    assert_eq!(messages.len(), 2);
    for message in &messages {
        assert_eq!(message.video_id, "v1");
        assert_eq!(message.channel_id, "UCabc");
    }
    assert_eq!(messages[0].message_id(), "v1#m1");
}
