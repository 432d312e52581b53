//! src/batch_ops.rs
//! Parallel embed/extract over independent packages (feature `batch-ops`).
//!
//! Each pair owns its own handle, so they run on the rayon pool without
//! coordination. The first error stops the batch; pairs already finished
//! keep their results.

use crate::container::ContainerFile;
use crate::envelope::Storage;
use crate::error::IntuneWinError;
use rayon::prelude::*;
use std::io::{Read, Seek, Write};

/// Embed each source into its package.
pub fn embed_batch<S, R>(batch: &mut [(ContainerFile<S>, R)]) -> Result<(), IntuneWinError>
where
    S: Storage + Send,
    R: Read + Seek + Send,
{
    batch
        .par_iter_mut()
        .try_for_each(|(package, source)| package.embed(source))
}

/// Extract each package into its sink. Returns plaintext lengths in input
/// order.
pub fn extract_batch<S, W>(batch: &mut [(ContainerFile<S>, W)]) -> Result<Vec<u64>, IntuneWinError>
where
    S: Storage + Send,
    W: Write + Send,
{
    batch
        .par_iter_mut()
        .map(|(package, sink)| package.extract(sink))
        .collect()
}
