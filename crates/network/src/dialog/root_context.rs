use async_trait::async_trait;
use proofnet_primitives::context::ContextId;
use proofnet_store::object::StoredObject;
use proofnet_wire::message::{RootContextRequest, RootContextResponse};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{Dialog, DialogContext};
use crate::outcome::Outcome;
use crate::transport::expect_message;
use crate::NetworkError;

/// Asks the peer for a root context. A found context is stored locally as
/// part of decoding the answer.
#[derive(Debug)]
pub(crate) struct FetchRootContext {
    pub context: ContextId,
}

#[async_trait]
impl Dialog for FetchRootContext {
    type Output = Option<StoredObject>;

    async fn dialogate(
        self,
        cx: &mut DialogContext<'_>,
    ) -> Result<Outcome<Option<StoredObject>>, NetworkError> {
        cx.transport
            .send(RootContextRequest {
                context: self.context,
            })
            .await?;

        let Some(frame) = cx.answer().await? else {
            debug!(peer=%cx.peer.node_id, context=%self.context, "root context fetch aborted");
            return Ok(Outcome::Aborted);
        };
        let response = expect_message!(cx.decode(&frame)?, RootContextResponse);

        if response.context != self.context {
            return Err(NetworkError::protocol(format!(
                "asked for root context {}, got {}",
                self.context, response.context
            )));
        }

        Ok(Outcome::Done(response.object))
    }
}

#[derive(Debug)]
pub(crate) struct ServeRootContext;

#[async_trait]
impl Dialog for ServeRootContext {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let RootContextRequest { context } =
            expect_message!(cx.decode(&frame)?, RootContextRequest);

        let budget = cx.transport.budget();
        let object = match timeout(budget, cx.shared.services.context.root_context(context)).await {
            Ok(Ok(object)) => object,
            Ok(Err(err)) => {
                warn!(%context, %err, "root context lookup failed");
                None
            }
            Err(_) => {
                debug!(%context, ?budget, "root context lookup timed out");
                None
            }
        };

        cx.transport
            .send(RootContextResponse { context, object })
            .await?;

        Ok(Outcome::Done(()))
    }
}
