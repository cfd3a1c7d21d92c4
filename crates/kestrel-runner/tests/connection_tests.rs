// Integration tests for request dispatch on a single connection

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use kestrel_events::{
    EventEnvelope, EventType, Reply, Request, SecurityViolation, ServerNotice, SessionId,
    Severity, SystemEvent,
};
use kestrel_runner::{AggregateError, ServerRunner};
use kestrel_scripting_host::{
    Behavior, BehaviorContext, Dialog, DialogError, DialogFuture, DialogTarget, HookResult,
    MemoryActor, Say, SessionState,
};
use kestrel_world::config::KestrelConfig;
use kestrel_world::{EntityId, Position};
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;

const MERCHANT: EntityId = EntityId(10);
const GUARDED: EntityId = EntityId(11);
const BROKEN: EntityId = EntityId(12);
const CURSED: EntityId = EntityId(13);

fn merchant_script(dialog: Dialog) -> DialogFuture {
    async move {
        dialog.msg("What'll it be?");
        loop {
            match dialog.select(&["browse", "bye"]).await {
                Reply::Purchase { item_id, quantity } => {
                    dialog.msg(format!("Sold {quantity} of #{item_id}."))
                }
                Reply::Keyword(keyword) => dialog.msg(format!("{keyword}? Never heard of it.")),
                Reply::Choice(choice) if choice == "bye" => break,
                Reply::Choice(_) => dialog.msg("Have a look."),
            }
        }
        dialog.close(Some("Farewell.")).await
    }
    .boxed()
}

fn broken_script(_dialog: Dialog) -> DialogFuture {
    async { Err::<(), _>(DialogError::script("ledger missing")) }.boxed()
}

fn cursed_script(dialog: Dialog) -> DialogFuture {
    async move {
        dialog.hook("inspect").await?;
        dialog.close(None).await
    }
    .boxed()
}

fn server() -> ServerRunner {
    let mut config = KestrelConfig::default();
    config.scheduler.seed = 42;

    ServerRunner::builder()
        .with_config(config)
        .with_npc(DialogTarget::new(MERCHANT, "merchant", Position::new(0, 0)).with_script(merchant_script))
        .with_npc(
            DialogTarget::new(GUARDED, "captain", Position::new(0, 0))
                .with_script(merchant_script)
                .with_required_authority(10),
        )
        .with_npc(DialogTarget::new(BROKEN, "clerk", Position::new(0, 0)).with_script(broken_script))
        .with_npc(DialogTarget::new(CURSED, "idol", Position::new(0, 0)).with_script(cursed_script))
        .with_hook("idol", "inspect", |dialog: Dialog| async move {
            if dialog.talker().authority < 99 {
                return Err(DialogError::Other(anyhow::Error::new(
                    SecurityViolation::severe("idol inspected by a forged talker"),
                )));
            }
            Ok(HookResult::Continue)
        })
        .build()
        .unwrap()
}

fn notices(rx: &mut UnboundedReceiver<ServerNotice>) -> Vec<ServerNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

fn system_events(rx: &mut broadcast::Receiver<EventEnvelope>) -> Vec<SystemEvent> {
    let mut out = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        if let EventType::System(event) = envelope.event {
            out.push(event);
        }
    }
    out
}

fn selectable(notices: &[ServerNotice]) -> SessionId {
    notices
        .iter()
        .rev()
        .find_map(|notice| match notice {
            ServerNotice::Selectable { session_id, .. } => Some(*session_id),
            _ => None,
        })
        .expect("no selectable notice")
}

#[tokio::test(start_paused = true)]
async fn test_merchant_purchase_flow() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(100, 0), 0);

    conn.handle(Request::TalkStart { target: MERCHANT }).unwrap();
    let first = notices(&mut rx);
    assert!(matches!(&first[0], ServerNotice::Message { text, .. } if text == "What'll it be?"));
    let first_id = selectable(&first);

    conn.handle(Request::Purchase {
        target: MERCHANT,
        item_id: 5,
        quantity: 2,
    })
    .unwrap();
    let second = notices(&mut rx);
    assert!(matches!(&second[0], ServerNotice::Message { text, .. } if text == "Sold 2 of #5."));
    let second_id = selectable(&second);
    assert_ne!(first_id, second_id);

    conn.handle(Request::Select {
        session_id: second_id,
        reply: Reply::choice("bye"),
    })
    .unwrap();
    let last = notices(&mut rx);
    assert!(matches!(
        last.as_slice(),
        [ServerNotice::Close { text: Some(text), .. }] if text == "Farewell."
    ));
    assert_eq!(conn.session().state(), SessionState::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_forged_session_id_ends_session_without_resuming() {
    let server = server();
    let mut events = server.subscribe();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::TalkStart { target: MERCHANT }).unwrap();
    let id = selectable(&notices(&mut rx));

    conn.handle(Request::Select {
        session_id: SessionId(id.0 ^ 1),
        reply: Reply::choice("browse"),
    })
    .unwrap();

    let after = notices(&mut rx);
    assert_eq!(
        after,
        vec![ServerNotice::Close {
            target: MERCHANT,
            text: None
        }]
    );
    assert!(!conn.session().is_valid(None));

    // The genuine id is stale now too
    conn.handle(Request::Select {
        session_id: id,
        reply: Reply::choice("browse"),
    })
    .unwrap();
    assert!(notices(&mut rx).is_empty());

    let invalidations = system_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SystemEvent::SessionInvalidated { .. }))
        .count();
    assert_eq!(invalidations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_keyword_for_other_target_ends_session() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::TalkStart { target: MERCHANT }).unwrap();
    notices(&mut rx);

    conn.handle(Request::Keyword {
        target: GUARDED,
        keyword: "bounty".into(),
    })
    .unwrap();

    let after = notices(&mut rx);
    assert!(matches!(after.as_slice(), [ServerNotice::Close { target, .. }] if *target == MERCHANT));
    assert!(!conn.session().is_valid(Some(MERCHANT)));
}

#[tokio::test(start_paused = true)]
async fn test_new_talk_replaces_old_session() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 50);

    conn.handle(Request::TalkStart { target: MERCHANT }).unwrap();
    let old = selectable(&notices(&mut rx));
    conn.handle(Request::TalkStart { target: GUARDED }).unwrap();
    notices(&mut rx);

    assert!(!conn.session().is_valid(Some(MERCHANT)));
    assert!(conn.session().is_valid(Some(GUARDED)));
    assert!(!conn.session().is_awaiting(old));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_npc_is_contained_and_warned() {
    let server = server();
    let mut events = server.subscribe();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::TalkStart { target: EntityId(999) }).unwrap();

    assert!(matches!(notices(&mut rx).as_slice(), [ServerNotice::Warning { .. }]));
    let violations: Vec<_> = system_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SystemEvent::SecurityViolation { severity, .. } => Some(severity),
            _ => None,
        })
        .collect();
    assert_eq!(violations, vec![Severity::Moderate]);
    assert!(!conn.is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_talk_is_mild_violation() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::TalkStart { target: GUARDED }).unwrap();

    assert!(matches!(notices(&mut rx).as_slice(), [ServerNotice::Warning { .. }]));
    assert_eq!(conn.session().state(), SessionState::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_is_rejected_not_penalized() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(5000, 0), 0);

    conn.handle(Request::TalkStart { target: MERCHANT }).unwrap();

    assert!(matches!(
        notices(&mut rx).as_slice(),
        [ServerNotice::TalkRejected { target, .. }] if *target == MERCHANT
    ));
}

#[tokio::test(start_paused = true)]
async fn test_script_failure_is_rethrown() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    let error = conn.handle(Request::TalkStart { target: BROKEN }).unwrap_err();

    assert!(format!("{error:#}").contains("ledger missing"));
    assert!(error.downcast_ref::<DialogError>().is_some());
    assert!(notices(&mut rx).is_empty());
    assert!(!conn.is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_severe_violation_inside_hook_disconnects() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::TalkStart { target: CURSED }).unwrap();

    assert!(matches!(notices(&mut rx).as_slice(), [ServerNotice::Disconnect { .. }]));
    assert!(conn.is_disconnected());

    // Nothing is processed after the disconnect
    conn.handle(Request::TalkStart { target: MERCHANT }).unwrap();
    assert!(notices(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_batch_with_mixed_failures() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    let error = conn
        .handle(Request::Batch(vec![
            Request::TalkStart { target: EntityId(999) },
            Request::TalkStart { target: BROKEN },
        ]))
        .unwrap_err();

    let aggregate = error.downcast_ref::<AggregateError>().unwrap();
    assert_eq!(aggregate.len(), 1);
    assert!(format!("{:#}", aggregate.errors()[0]).contains("ledger missing"));

    let warnings = notices(&mut rx)
        .into_iter()
        .filter(|n| matches!(n, ServerNotice::Warning { .. }))
        .count();
    assert_eq!(warnings, 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_of_violations_fully_contained() {
    let server = server();
    let (mut conn, mut rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::Batch(vec![
        Request::TalkStart { target: EntityId(998) },
        Request::TalkStart { target: EntityId(999) },
    ]))
    .unwrap();

    assert_eq!(notices(&mut rx).len(), 2);
}

struct Chatty;

impl Behavior for Chatty {
    fn idle(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(Say::new("Another traveller!"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_player_moved_wakes_nearby_behaviors() {
    let server = server();
    let actor = Arc::new(MemoryActor::new(77, Position::new(1000, 1000)));
    let scheduler = server.behaviors().register(actor.clone(), Box::new(Chatty));
    let (mut conn, _rx) = server.connect(EntityId(1), Position::new(0, 0), 0);

    conn.handle(Request::PlayerMoved {
        position: Position::new(500, 500),
    })
    .unwrap();
    assert!(scheduler.is_active());
    assert_eq!(conn.position(), Position::new(500, 500));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(actor.said(), vec!["Another traveller!".to_string()]);
    server.shutdown().await;
    assert!(!scheduler.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_spawned_connection_runs_until_shutdown() {
    let server = server();
    let mut handle = server.spawn_connection(EntityId(1), Position::new(0, 0), 0);

    handle
        .requests
        .send(Request::TalkStart { target: MERCHANT })
        .unwrap();
    let greeting = handle.notices.recv().await.unwrap();
    assert!(matches!(greeting, ServerNotice::Message { .. }));

    server.shutdown().await;
    tokio::time::timeout(Duration::from_secs(1), handle.task)
        .await
        .unwrap()
        .unwrap();
}
