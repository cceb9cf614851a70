mod common;

use claims::assert_some;
use common::{config, dead_address, female, female_with, within, Recorder};
use proofnet_network::Outcome;
use proofnet_primitives::gender::Gender;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_reachable_female_joins() -> eyre::Result<()> {
    let hook = female(Recorder::new()).await?;
    let joiner = female(Recorder::new()).await?;
    let hook_address = assert_some!(hook.local_address());
    let joiner_address = assert_some!(joiner.public_address());

    let outcome = within(joiner.network_join(hook_address, &CancellationToken::new())).await?;

    assert_eq!(outcome, Outcome::Done(true));
    assert!(hook
        .hooks()?
        .iter()
        .any(|known| known.address() == joiner_address && known.last_success_millis() > 0));
    assert!(joiner
        .hooks()?
        .iter()
        .any(|known| known.address() == hook_address));

    Ok(())
}

#[tokio::test]
async fn test_unreachable_female_is_not_joined() -> eyre::Result<()> {
    let hook = female(Recorder::new()).await?;

    let unreachable = dead_address().await?;
    let mut config = config(Gender::Female);
    config.network.public_address = Some(unreachable);
    let joiner = female_with(config, |services| services).await?;

    let outcome = within(joiner.network_join(
        assert_some!(hook.local_address()),
        &CancellationToken::new(),
    ))
    .await?;

    assert_eq!(outcome, Outcome::Done(false));
    assert!(!hook
        .hooks()?
        .iter()
        .any(|known| known.address() == unreachable && known.last_success_millis() > 0));

    Ok(())
}
