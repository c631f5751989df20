//! Turns a ranked result set into the context block handed to the generator,
//! plus the deduplicated list of cited source paths.

use crate::stores::QueryHit;

/// Context ready for prompt construction.
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledContext {
    /// Numbered chunk bodies separated by blank lines.
    pub context: String,
    /// Source paths in first-appearance order, deduplicated.
    pub cited: Vec<String>,
}

/// Stateless assembler; hits go in ranked, the block preserves that order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn assemble(&self, hits: &[QueryHit]) -> AssembledContext {
        let context = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("Document {}:\n{}", i + 1, hit.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut cited = Vec::new();
        for hit in hits {
            if let Some(source) = hit.metadata.get("source").and_then(|v| v.as_str()) {
                if !cited.iter().any(|seen| seen == source) {
                    cited.push(source.to_string());
                }
            }
        }

        AssembledContext { context, cited }
    }
}
