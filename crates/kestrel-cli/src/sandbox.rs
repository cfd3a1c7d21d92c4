//! Content for the sandbox: a few behaviors, one talking NPC and a
//! scripted player that drives it.

use std::time::Duration;

use futures::FutureExt;
use kestrel_events::{Reply, Request, ServerNotice};
use kestrel_runner::ConnectionHandle;
use kestrel_scripting_host::{
    Behavior, BehaviorContext, BehaviorState, Dialog, DialogError, DialogFuture, DialogTarget,
    HookResult, Say, SayRandomPhrase, Sequence, Timeout, Wait, Wander,
};
use kestrel_world::{EntityId, Position};
use tracing::info;

pub const INNKEEPER: EntityId = EntityId(500);

/// Idles around its spawn point and chats now and then
pub struct Villager;

impl Behavior for Villager {
    fn idle(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(Wait::new(1000, 3000));
        ctx.enqueue(Timeout::new(4000, Wander::new(200, 600)));
        ctx.enqueue(SayRandomPhrase::new([
            "Lovely weather.",
            "Have you seen my goat?",
            "The inn serves a decent stew.",
        ]));
    }

    fn on_activate(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(Say::new("Oh, hello there."));
    }
}

/// Paces its post and shouts once the watch has gone on long enough
pub struct Sentry {
    pub patience_ms: u64,
}

impl Behavior for Sentry {
    fn select_state(&mut self, ctx: &mut BehaviorContext<'_>) -> BehaviorState {
        if ctx.elapsed_ms() >= self.patience_ms {
            BehaviorState::Aggro
        } else {
            BehaviorState::Idle
        }
    }

    fn idle(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(
            Sequence::new()
                .then(Wander::new(100, 300))
                .then(Wait::exactly(1500)),
        );
    }

    fn aggro(&mut self, ctx: &mut BehaviorContext<'_>) {
        ctx.enqueue(Say::new("Who goes there?"));
        ctx.deactivate();
    }
}

pub fn innkeeper() -> DialogTarget {
    DialogTarget::new(INNKEEPER, "innkeeper", Position::new(0, 0)).with_script(innkeeper_script)
}

fn innkeeper_script(dialog: Dialog) -> DialogFuture {
    async move {
        dialog.hook("greet").await?;
        loop {
            match dialog.select(&["room", "stew", "bye"]).await {
                Reply::Choice(choice) if choice == "room" => {
                    dialog.msg("Rooms are upstairs, ten coins a night.")
                }
                Reply::Choice(choice) if choice == "stew" => dialog.msg("Fresh this morning."),
                Reply::Purchase { item_id, quantity } => {
                    dialog.msg(format!("{quantity} of #{item_id}, coming up."))
                }
                Reply::Keyword(keyword) => dialog.msg(format!("Can't help you with {keyword}.")),
                Reply::Choice(_) => break,
            }
        }
        dialog.close(Some("Safe travels.")).await
    }
    .boxed()
}

/// `greet` hook for the innkeeper
pub async fn greet(dialog: Dialog) -> Result<HookResult, DialogError> {
    dialog.msg(format!("Welcome to the inn, traveller #{}.", dialog.talker().id.0));
    Ok(HookResult::Continue)
}

/// Walk up to the innkeeper, ask about everything on offer and leave
pub async fn scripted_player(mut handle: ConnectionHandle) {
    let mut answers = ["room", "stew", "bye"].into_iter();

    let _ = handle.requests.send(Request::PlayerMoved {
        position: Position::new(0, 0),
    });
    let _ = handle.requests.send(Request::TalkStart { target: INNKEEPER });

    while let Some(notice) = handle.notices.recv().await {
        match notice {
            ServerNotice::Message { text, .. } => info!("innkeeper: {}", text),
            ServerNotice::Selectable {
                session_id,
                options,
                ..
            } => {
                let Some(answer) = answers.next() else {
                    break;
                };
                info!("player picks {:?} from {:?}", answer, options);
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = handle.requests.send(Request::Select {
                    session_id,
                    reply: Reply::choice(answer),
                });
            }
            ServerNotice::Close { text, .. } => {
                if let Some(text) = text {
                    info!("innkeeper: {}", text);
                }
                break;
            }
            ServerNotice::TalkRejected { reason, .. } => {
                info!("innkeeper won't talk: {}", reason);
                break;
            }
            ServerNotice::Warning { text } => info!("warning: {}", text),
            ServerNotice::Disconnect { reason } => {
                info!("disconnected: {}", reason);
                break;
            }
        }
    }
}
