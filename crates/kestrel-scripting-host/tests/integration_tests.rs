// Integration tests for behavior scheduling and conversations

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use kestrel_events::{Reply, ServerNotice};
use kestrel_scripting_host::{
    Behavior, BehaviorContext, BehaviorRegistry, BehaviorState, ConversationSession, Dialog,
    DialogFuture, DialogTarget, HookOutcome, HookRegistry, HookResult, MemoryActor, Say, SayRandomPhrase,
    SessionState, Talker, Timeout, Wait, Wander,
};
use kestrel_world::config::SchedulerConfig;
use kestrel_world::{Actor, ConnectionId, EntityId, Position, SeedSource};
use tokio::runtime::Handle;

/// Wanders, pauses, and sometimes chats
struct Villager;

impl Behavior for Villager {
    fn idle(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(Timeout::new(5_000, Wander::new(200, 600)));
        ctx.enqueue(Wait::new(500, 1500));
        ctx.enqueue(SayRandomPhrase::new(["Nice day.", "Hm.", "Off to market."]));
    }
}

/// Goes aggro once it has been active for a while
struct Guard {
    alarmed_after_ms: u64,
    shouted: bool,
}

impl Behavior for Guard {
    fn select_state(&mut self, ctx: &mut BehaviorContext<'_>) -> BehaviorState {
        if ctx.elapsed_ms() >= self.alarmed_after_ms {
            BehaviorState::Aggro
        } else {
            BehaviorState::Idle
        }
    }

    fn idle(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(Wait::exactly(100));
    }

    fn aggro(&mut self, ctx: &mut BehaviorContext<'_>) {
        if self.shouted {
            ctx.deactivate();
        } else {
            ctx.enqueue(Say::new("Halt!"));
            self.shouted = true;
        }
    }
}

fn registry(seed: u64) -> BehaviorRegistry {
    BehaviorRegistry::new(
        SchedulerConfig::default(),
        Arc::new(SeedSource::new(seed)),
        Handle::current(),
    )
}

async fn run_villager(seed: u64) -> (Vec<Position>, Vec<String>) {
    let registry = registry(seed);
    let actor = Arc::new(MemoryActor::new(1, Position::new(0, 0)));
    let scheduler = registry.register(actor.clone(), Box::new(Villager));
    scheduler.set_interval(100);
    scheduler.activate();

    // Walk between ticks
    tokio::time::sleep(Duration::from_millis(50)).await;
    for _ in 0..300 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        actor.walk(40.0);
    }
    registry.shutdown();
    (actor.moves(), actor.said())
}

#[tokio::test(start_paused = true)]
async fn test_villager_replays_identically_with_same_seed() {
    let first = run_villager(77).await;
    let second = run_villager(77).await;

    assert!(!first.0.is_empty());
    assert!(!first.1.is_empty());
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_aggro_reachable_through_select_state() {
    let registry = registry(1);
    let actor = Arc::new(MemoryActor::new(2, Position::new(0, 0)));
    let guard = Guard {
        alarmed_after_ms: 2000,
        shouted: false,
    };
    let scheduler = registry.register(actor.clone(), Box::new(guard));
    scheduler.activate();

    tokio::time::sleep(Duration::from_secs(10)).await;

    // Waits finish on the 2000ms tick, so the first aggro evaluation is at 2500
    assert_eq!(actor.said(), vec!["Halt!".to_string()]);
    assert!(!scheduler.is_active());
    assert_eq!(scheduler.elapsed_ms(), 3000);
}

#[tokio::test(start_paused = true)]
async fn test_wake_near_restarts_after_observer_leaves() {
    let registry = registry(3);
    let actor = Arc::new(MemoryActor::new(3, Position::new(500, 500)));
    let scheduler = registry.register(actor.clone(), Box::new(Villager));

    assert_eq!(registry.wake_near(Position::new(0, 0), 3000.0), 1);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(scheduler.is_active());

    actor.set_observer_nearby(false);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!scheduler.is_active());
    let ticks = scheduler.ticks();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(scheduler.ticks(), ticks);

    actor.set_observer_nearby(true);
    assert_eq!(registry.wake_near(actor.position(), 100.0), 1);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(scheduler.ticks() > ticks);
    registry.shutdown();
}

fn banker() -> Arc<DialogTarget> {
    let script = |dialog: Dialog| -> DialogFuture {
        async move {
            dialog.msg("Welcome to the bank.");
            if dialog.hook("before_menu").await? == HookOutcome::ShortCircuited {
                return dialog.close(Some("We are closed.")).await;
            }
            loop {
                match dialog.select(&["deposit", "withdraw", "leave"]).await {
                    Reply::Choice(choice) if choice == "leave" => break,
                    Reply::Choice(choice) => dialog.msg(format!("You chose {choice}.")),
                    Reply::Keyword(keyword) => dialog.msg(format!("About {keyword}...")),
                    Reply::Purchase { .. } => dialog.msg("We don't sell anything."),
                }
            }
            dialog.close(Some("Goodbye.")).await
        }
        .boxed()
    };
    Arc::new(
        DialogTarget::new(EntityId(50), "banker", Position::new(0, 0)).with_script(script),
    )
}

fn talker() -> Talker {
    Talker::new(EntityId(900), ConnectionId(4), Position::new(100, 0))
}

fn notices(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ServerNotice>) -> Vec<ServerNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

#[test]
fn test_banker_conversation_round_trip() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let hooks = Arc::new(HookRegistry::new());
    let mut session = ConversationSession::new(ConnectionId(4), tx, hooks, 1000.0);

    session.start(banker(), talker()).unwrap();
    assert_eq!(session.state(), SessionState::Suspended);
    assert_eq!(notices(&mut rx).len(), 2);

    for reply in [
        Reply::choice("deposit"),
        Reply::Keyword("interest".into()),
        Reply::Purchase { item_id: 1, quantity: 1 },
    ] {
        let id = session.session_id().unwrap();
        assert!(session.is_awaiting(id));
        assert!(session.set_response(reply));
        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Suspended);
        assert_ne!(session.session_id(), Some(id));
    }

    let texts: Vec<_> = notices(&mut rx)
        .into_iter()
        .filter_map(|n| match n {
            ServerNotice::Message { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(
        texts,
        vec!["You chose deposit.", "About interest...", "We don't sell anything."]
    );

    assert!(session.set_response(Reply::choice("leave")));
    session.resume().unwrap();
    assert_eq!(session.state(), SessionState::Ended);
    assert!(matches!(
        notices(&mut rx).last(),
        Some(ServerNotice::Close { text: Some(text), .. }) if text == "Goodbye."
    ));
}

#[test]
fn test_hook_short_circuit_closes_early() {
    let mut hooks = HookRegistry::new();
    hooks.register("banker", "before_menu", |dialog: Dialog| async move {
        dialog.msg("The vault is being audited.");
        Ok(HookResult::Break)
    });
    hooks.register("banker", "before_menu", |dialog: Dialog| async move {
        dialog.msg("never shown");
        Ok(HookResult::Continue)
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = ConversationSession::new(ConnectionId(4), tx, Arc::new(hooks), 1000.0);
    session.start(banker(), talker()).unwrap();

    let notices = notices(&mut rx);
    assert_eq!(notices.len(), 3);
    assert!(matches!(&notices[1], ServerNotice::Message { text, .. } if text == "The vault is being audited."));
    assert!(matches!(&notices[2], ServerNotice::Close { text: Some(text), .. } if text == "We are closed."));
    assert_eq!(session.state(), SessionState::Ended);
}
