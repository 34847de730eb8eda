/*
 * Copyright 2025 Oxide Computer Company
 */

use async_trait::async_trait;
use log::{debug, trace};

use crate::client::{Client, Oracle};
use crate::error::Result;
use crate::update::Updates;

/*
 * Anything that can be driven onto a device.  "compile" produces the
 * updates that bring the device to the desired state for this entity, and
 * "reset" produces the updates that remove it again.  Both may consult the
 * device through the oracle but never modify it.
 */
#[async_trait]
pub trait Configurable: Send + Sync + std::fmt::Display {
    async fn compile(&self, o: &dyn Oracle) -> Result<Updates>;

    async fn reset(&self, o: &dyn Oracle) -> Result<Updates>;
}

/*
 * Compile an entity against the device and apply the result as one
 * transaction.  Returns the updates that were applied.
 */
pub async fn apply<C: Client>(
    c: &C,
    e: &dyn Configurable,
) -> Result<Updates> {
    let updates = e.compile(c).await?;
    debug!("{e}: applying {} updates", updates.len());
    for u in &updates {
        trace!("    {u}");
    }

    if !updates.is_empty() {
        c.apply(updates.as_slice()).await?;
    }
    Ok(updates)
}

/*
 * Like apply(), but for the removal of the entity.
 */
pub async fn remove<C: Client>(
    c: &C,
    e: &dyn Configurable,
) -> Result<Updates> {
    let updates = e.reset(c).await?;
    debug!("{e}: removing with {} updates", updates.len());
    for u in &updates {
        trace!("    {u}");
    }

    if !updates.is_empty() {
        c.apply(updates.as_slice()).await?;
    }
    Ok(updates)
}
