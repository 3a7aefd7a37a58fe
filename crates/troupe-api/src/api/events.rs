// SSE change projection
//
// Projects the resource change feed to per-client filtered streams. Each
// connection gets a bounded channel; the watcher-side listener drops events
// the client is too slow for, and reports itself disconnected once the
// client goes away so the watcher can unregister it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use troupe_core::{Error, ResourceEvent, ResourceType};
use troupe_engine::ResourceWatcher;

/// Events buffered per connection before slow clients start missing some
const CLIENT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub watcher: Arc<ResourceWatcher>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated resource types (e.g. "AGENT,TEAM"); all when unset
    pub resource_types: Option<String>,
    #[serde(default = "default_true")]
    pub spec_changes: bool,
    #[serde(default = "default_true")]
    pub status_changes: bool,
}

fn default_true() -> bool {
    true
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v0.1/resource-events", get(resource_events))
        .with_state(state)
}

/// GET /v0.1/resource-events - Stream filtered resource changes (SSE)
#[utoipa::path(
    get,
    path = "/v0.1/resource-events",
    params(
        ("resource_types" = Option<String>, Query, description = "Comma-separated resource types"),
        ("spec_changes" = Option<bool>, Query, description = "Include spec changes"),
        ("status_changes" = Option<bool>, Query, description = "Include status changes")
    ),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 400, description = "No change class selected or unknown resource type")
    ),
    tag = "events"
)]
pub async fn resource_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    if !query.spec_changes && !query.status_changes {
        return Err(StatusCode::BAD_REQUEST);
    }
    let resource_types = parse_resource_types(query.resource_types.as_deref())
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let (tx, rx) = tokio::sync::mpsc::channel::<ResourceEvent>(CLIENT_BUFFER);
    let spec_changes = query.spec_changes;
    let status_changes = query.status_changes;

    state.watcher.add_listener(Box::new(move |event| {
        if let Some(types) = &resource_types {
            if !types.contains(&event.resource_type()) {
                return Ok(());
            }
        }
        let wanted = match event {
            ResourceEvent::Delete(_) => true,
            ResourceEvent::Put(put) => {
                (spec_changes && put.spec_changed) || (status_changes && put.status_changed)
            }
        };
        if !wanted {
            return Ok(());
        }
        match tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("dropping resource event for slow SSE client");
                Ok(())
            }
            // Client went away; have the watcher unregister us
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::ListenerDisconnected)
            }
        }
    }));

    tracing::debug!("started resource event stream");
    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().event("resource").data(data))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn parse_resource_types(raw: Option<&str>) -> Result<Option<Vec<ResourceType>>, Error> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .map(|name| {
            serde_json::from_value::<ResourceType>(serde_json::Value::String(
                name.trim().to_string(),
            ))
            .map_err(|_| Error::invalid_event(format!("unknown resource type '{name}'")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_filters_parse_from_comma_lists() {
        assert_eq!(parse_resource_types(None).unwrap(), None);
        assert_eq!(
            parse_resource_types(Some("AGENT, TEAM")).unwrap(),
            Some(vec![ResourceType::Agent, ResourceType::Team])
        );
        assert!(parse_resource_types(Some("GADGET")).is_err());
    }
}
