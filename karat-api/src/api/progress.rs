//! Progress stream endpoint
//!
//! `GET /api/appraisals/progress/:request_id` streams the percent values
//! published on the request's channel as Server-Sent Events, in
//! publication order. The stream ends once the terminal value (100) has
//! been delivered.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tracing::{info, warn};

use karat_common::progress::events_after;

use crate::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// GET /api/appraisals/progress/:request_id
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(request_id = %request_id, "Progress subscriber connected");
    let pool = state.db.clone();

    let stream = async_stream::stream! {
        let mut last_id = 0i64;
        let mut finished = false;

        while !finished {
            match events_after(&pool, &request_id, last_id).await {
                Ok(events) => {
                    for (id, percent) in events {
                        last_id = id;
                        finished = percent == "100";
                        yield Ok(Event::default().data(percent));
                        if finished {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Progress poll failed");
                }
            }

            if !finished {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
