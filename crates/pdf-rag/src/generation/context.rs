//! Context assembly from retrieved passages

use serde::{Deserialize, Serialize};

use crate::types::{Citation, RetrievalResult};

const BLOCK_SEPARATOR: &str = "\n\n";

/// Prompt context plus the provenance of every block in it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub context: String,
    /// One entry per block, in block order
    pub citations: Vec<Citation>,
}

impl AssembledContext {
    /// True when nothing was retrieved; callers answer without the generator
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Formats retrieved passages into labelled context blocks
pub struct ContextAssembler;

impl ContextAssembler {
    /// Render `results` as `[filename, Page N]\n<text>` blocks separated by a
    /// blank line, in the order received
    ///
    /// With `max_length` (in characters), the lowest-scoring blocks are dropped
    /// whole until the context fits. The highest-scoring block is always kept,
    /// even if it alone exceeds the limit.
    pub fn assemble(results: &[RetrievalResult], max_length: Option<usize>) -> AssembledContext {
        if results.is_empty() {
            return AssembledContext::default();
        }

        let blocks: Vec<(Citation, String)> = results
            .iter()
            .map(|r| {
                let citation = Citation::from_result(r);
                let block = format!("{}\n{}", citation.label(), r.text);
                (citation, block)
            })
            .collect();

        let mut kept: Vec<usize> = (0..blocks.len()).collect();
        if let Some(limit) = max_length {
            let block_len = |i: usize| blocks[i].1.chars().count();
            let mut total: usize = kept.iter().map(|&i| block_len(i)).sum::<usize>()
                + BLOCK_SEPARATOR.len() * (kept.len() - 1);

            while total > limit && kept.len() > 1 {
                // Lowest score goes first; among equal scores, the later block
                let lowest = kept.iter().copied().enumerate().min_by(|&(pa, a), &(pb, b)| {
                    blocks[a]
                        .0
                        .score
                        .total_cmp(&blocks[b].0.score)
                        .then(pb.cmp(&pa))
                });
                let Some((pos, victim)) = lowest else { break };
                total -= block_len(victim) + BLOCK_SEPARATOR.len();
                kept.remove(pos);
            }

            if kept.len() < blocks.len() {
                tracing::debug!(
                    "Dropped {} of {} context blocks to fit {} characters",
                    blocks.len() - kept.len(),
                    blocks.len(),
                    limit
                );
            }
        }

        let mut context = String::new();
        let mut citations = Vec::with_capacity(kept.len());
        for (n, &i) in kept.iter().enumerate() {
            if n > 0 {
                context.push_str(BLOCK_SEPARATOR);
            }
            context.push_str(&blocks[i].1);
            citations.push(blocks[i].0.clone());
        }

        AssembledContext { context, citations }
    }
}
