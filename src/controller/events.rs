use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use axum_extra::{headers, TypedHeader};
use futures::{Stream, StreamExt as _};
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::{
    auth::AuthSession,
    context::{AppContext, UserEvent},
    error::{AppError, AppResult},
};

/// Streams the signed-in user's notifications as they are created.
pub async fn events(
    State(context): State<AppContext>,
    AuthSession { user, .. }: AuthSession,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let user = user.ok_or(AppError::Unauthorized)?;
    let agent = user_agent
        .map(|TypedHeader(agent)| agent.as_str().to_string())
        .unwrap_or_default();
    info!("{} connected to events from `{agent}`", user.username);

    let stream = user_events(context.events().subscribe(), user.id).map(|event| {
        Ok::<_, Infallible>(Event::default().event(event.name).data(event.data))
    });
    let stream = or_until_shutdown(stream);

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

/// Events addressed to `user_id`. A lagging receiver skips what it missed.
fn user_events(
    mut rx: broadcast::Receiver<UserEvent>,
    user_id: i32,
) -> impl Stream<Item = UserEvent> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.user_id == user_id => yield event,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event stream for user {user_id} skipped {skipped} event(s)");
                }
                Err(RecvError::Closed) => {
                    debug!("event channel closed");
                    break;
                }
            }
        }
    }
}

fn or_until_shutdown<S>(stream: S) -> impl Stream<Item = S::Item>
where
    S: Stream,
{
    async_stream::stream! {
        futures::pin_mut!(stream);

        let shutdown_signal = crate::shutdown_signal(None);
        futures::pin_mut!(shutdown_signal);

        loop {
            tokio::select! {
                Some(item) = stream.next() => {
                    yield item
                }
                _ = &mut shutdown_signal => {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: i32, data: &str) -> UserEvent {
        UserEvent {
            user_id,
            name: "notification",
            data: data.to_string(),
        }
    }

    #[tokio::test]
    async fn only_delivers_the_users_events() {
        let (tx, rx) = broadcast::channel(8);
        let stream = user_events(rx, 7);
        futures::pin_mut!(stream);

        tx.send(event(3, "not yours")).unwrap();
        tx.send(event(7, "yours")).unwrap();
        drop(tx);

        let delivered: Vec<_> = stream.map(|event| event.data).collect().await;
        assert_eq!(delivered, vec!["yours".to_string()]);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let (tx, _) = broadcast::channel(8);
        let first = user_events(tx.subscribe(), 7);
        let second = user_events(tx.subscribe(), 7);

        tx.send(event(7, "hello")).unwrap();
        drop(tx);

        let first: Vec<_> = first.collect().await;
        let second: Vec<_> = second.collect().await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
