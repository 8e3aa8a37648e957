//! Restoration from the verbatim store
//!
//! A linear pass over the compressed sequence. Rewrites expand back into
//! their originals; ids absent from the store degrade gracefully, with
//! the compressed form staying in the output and the id reported.

use crate::pipeline;
use cce_core::{Error, Message, UncompressOptions, UncompressResult, VerbatimSource};
use tracing::debug;

/// Restore a compressed sequence using the verbatim store.
pub fn uncompress(
    messages: &[Message],
    store: &dyn VerbatimSource,
    options: &UncompressOptions,
) -> Result<UncompressResult, Error> {
    pipeline::validate(messages)?;

    let mut current: Vec<Message> = messages.to_vec();
    let mut expanded_total = 0usize;
    let mut passthrough_first = 0usize;
    let mut missing: Vec<String> = Vec::new();
    let rounds = if options.recursive {
        options.max_depth
    } else {
        1
    };

    for round in 0..rounds {
        let mut next = Vec::with_capacity(current.len());
        let mut expanded = 0usize;
        let mut passthrough = 0usize;

        for message in &current {
            let record = match message.provenance() {
                Some(record) => record,
                None => {
                    next.push(message.clone());
                    passthrough += 1;
                    continue;
                }
            };

            let mut restored = Vec::with_capacity(record.ids.len());
            let mut unresolved = Vec::new();
            for id in &record.ids {
                match store.lookup(id) {
                    Some(original) => restored.push(original),
                    None => unresolved.push(id.clone()),
                }
            }

            if unresolved.is_empty() {
                next.extend(restored);
                expanded += 1;
            } else {
                for id in unresolved {
                    if !missing.contains(&id) {
                        missing.push(id);
                    }
                }
                next.push(message.clone());
            }
        }

        if round == 0 {
            passthrough_first = passthrough;
        }
        expanded_total += expanded;
        current = next;
        if expanded == 0 {
            break;
        }
    }

    debug!(
        expanded = expanded_total,
        missing = missing.len(),
        "decompression complete"
    );
    Ok(UncompressResult {
        messages: current,
        messages_expanded: expanded_total,
        messages_passthrough: passthrough_first,
        missing_ids: missing,
    })
}
