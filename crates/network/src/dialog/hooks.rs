use async_trait::async_trait;
use proofnet_primitives::gender::Gender;
use proofnet_store::hook;
use proofnet_wire::message::{HookAddress, Hooks, HooksRequest};
use tracing::debug;

use super::{Dialog, DialogContext};
use crate::outcome::Outcome;
use crate::transport::{expect_message, persist};
use crate::NetworkError;

/// Asks the peer for the Female addresses it knows and merges them into the
/// local hook list. Yields how many addresses were merged.
#[derive(Debug)]
pub(crate) struct FetchHooks;

#[async_trait]
impl Dialog for FetchHooks {
    type Output = usize;

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<usize>, NetworkError> {
        cx.transport.send(HooksRequest).await?;

        let Some(frame) = cx.answer().await? else {
            return Ok(Outcome::Aborted);
        };
        let hooks = expect_message!(cx.decode(&frame)?, Hooks);
        let own = cx.shared.public_address();

        let merged = persist(&cx.shared.store, |tx| {
            let mut merged = 0;

            for learned in &hooks.hooks {
                if Some(learned.address) == own {
                    continue;
                }

                let mut stored = hook::touch(tx, learned.address)?;
                stored.merge_success(learned.last_success_millis);
                tx.put(&stored)?;
                merged += 1;
            }

            Ok(merged)
        })?;

        debug!(peer=%cx.peer.node_id, merged, "merged hooks");

        Ok(Outcome::Done(merged))
    }
}

#[derive(Debug)]
pub(crate) struct ServeHooks;

#[async_trait]
impl Dialog for ServeHooks {
    type Output = ();

    async fn dialogate(self, cx: &mut DialogContext<'_>) -> Result<Outcome<()>, NetworkError> {
        let frame = cx.transport.recv_frame().await?;
        let _request = expect_message!(cx.decode(&frame)?, HooksRequest);

        let known = hook::by_priority(&mut cx.shared.store.begin())?;
        let limit = cx.transport.limits().max_array_len as usize;

        let mut hooks: Vec<_> = known
            .iter()
            .filter(|known| known.failed_attempts() == 0)
            .filter(|known| Some(known.address()) != cx.peer.listen_address)
            .map(|known| HookAddress {
                address: known.address(),
                last_success_millis: known.last_success_millis(),
            })
            .collect();

        // Our own address goes out unverified.
        if cx.shared.gender() == Gender::Female {
            if let Some(address) = cx.shared.public_address() {
                hooks.insert(
                    0,
                    HookAddress {
                        address,
                        last_success_millis: 0,
                    },
                );
            }
        }

        hooks.truncate(limit);

        cx.transport.send(Hooks { hooks }).await?;

        Ok(Outcome::Done(()))
    }
}
