//! Routing of inbound client lines.
//!
//! Session bookkeeping (`Exit`) is handled right here on the session's
//! task. Everything else is posted to the control task and not waited
//! for, so a slow player never stalls a reader.

use remote_protocol::wire::OSD_REMOTE_DISCONNECTED;
use remote_protocol::{parse_request, Request};
use tracing::debug;

use crate::context::ServerContext;
use crate::types::{ClientId, ControlRequest};

/// Decode one line from `origin` and act on it.
///
/// Lines that do not decode are dropped silently.
pub(crate) async fn dispatch(ctx: &ServerContext, origin: ClientId, line: &str) {
    let Some(request) = parse_request(line) else {
        debug!(client = %origin, line, "ignoring unrecognised line");
        return;
    };

    match request {
        Request::Exit { client } => {
            let target = client.map(ClientId).unwrap_or(origin);
            if ctx.teardown(target, None).await {
                ctx.post(ControlRequest::ShowText(OSD_REMOTE_DISCONNECTED.to_string()));
            }
        }
        Request::Command(command) => {
            ctx.post(ControlRequest::Command { origin, command });
        }
    }
}
