//! Forward references
//!
//! Elements may name a sequence id before that sequence has been read.
//! Such links are queued here and settled in one pass once every document
//! of a load has been parsed.

use crate::model::{CodonFrameId, MappingId, Workspace};
use crate::registry::IdentityRegistry;

/// A link waiting for its target sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardReference {
    /// Set `mapping.to` to the dataset sequence of `target_id`.
    MappingTarget { mapping: MappingId, target_id: String },
    /// Add (`target_id`'s dataset sequence, `mapping`) to `frame`, once
    /// `mapping` itself has a target.
    CodonFrameTarget {
        frame: CodonFrameId,
        mapping: MappingId,
        target_id: String,
    },
}

impl ForwardReference {
    pub fn target_id(&self) -> &str {
        match self {
            ForwardReference::MappingTarget { target_id, .. } => target_id,
            ForwardReference::CodonFrameTarget { target_id, .. } => target_id,
        }
    }

    /// The target id is known to the registry.
    pub fn is_resolvable(&self, registry: &IdentityRegistry) -> bool {
        registry.knows_sequence(self.target_id())
    }

    /// Performs the link. Returns `false` if preconditions beyond the
    /// target's existence are not met yet.
    pub fn resolve(&self, registry: &IdentityRegistry, ws: &mut Workspace) -> bool {
        let Some(target) = registry.resolve_sequence(self.target_id()) else {
            return false;
        };
        match self {
            ForwardReference::MappingTarget { mapping, .. } => {
                let root = ws.dataset_root(target);
                match ws.mappings.get_mut(*mapping) {
                    Some(m) => {
                        m.to = Some(root);
                        true
                    }
                    None => false,
                }
            }
            ForwardReference::CodonFrameTarget { frame, mapping, .. } => {
                let mapped = ws.mappings.get(*mapping).is_some_and(|m| m.to.is_some());
                if !mapped {
                    return false;
                }
                let dna = ws.dataset_root(target);
                match ws.codon_frames.get_mut(*frame) {
                    Some(cf) => {
                        cf.add(dna, *mapping);
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub resolved: usize,
    /// Target id never became known.
    pub unresolved: usize,
    /// Target known but the link could not be made.
    pub failed: usize,
}

impl ResolutionReport {
    pub fn remaining(&self) -> usize {
        self.unresolved + self.failed
    }
}

#[derive(Debug, Default, Clone)]
pub struct ForwardRefQueue {
    pending: Vec<ForwardReference>,
}

impl ForwardRefQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reference: ForwardReference) {
        log::debug!("Queued forward reference to {}", reference.target_id());
        self.pending.push(reference);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[ForwardReference] {
        &self.pending
    }

    /// Single pass over the queue; anything left over stays pending.
    pub fn resolve_all(&mut self, registry: &IdentityRegistry, ws: &mut Workspace) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        let queue = std::mem::take(&mut self.pending);
        for reference in queue {
            if !reference.is_resolvable(registry) {
                report.unresolved += 1;
                self.pending.push(reference);
            } else if reference.resolve(registry, ws) {
                report.resolved += 1;
            } else {
                report.failed += 1;
                self.pending.push(reference);
            }
        }
        if report.remaining() > 0 {
            log::warn!(
                "{} forward references were unresolved and {} failed to resolve",
                report.unresolved,
                report.failed
            );
            for reference in &self.pending {
                log::debug!("Pending reference to {}", reference.target_id());
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodonFrame, MapList, Mapping, Sequence};

    fn codon_map() -> MapList {
        MapList::new(vec![[1, 9]], vec![[1, 3]], 3, 1)
    }

    #[test]
    fn test_mapping_target_resolves_to_dataset_root() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let mapping = ws.mappings.insert(Mapping::new(codon_map(), None));
        let mut queue = ForwardRefQueue::new();
        queue.push(ForwardReference::MappingTarget {
            mapping,
            target_id: "sq9".into(),
        });

        let aligned = ws.add_sequence(Sequence::new("p", "M-K"));
        let root = ws.ensure_dataset_sequence(aligned);
        reg.register_sequence("sq9", aligned);

        let report = queue.resolve_all(&reg, &mut ws);
        assert_eq!(report.resolved, 1);
        assert!(queue.is_empty());
        assert_eq!(ws.mappings[mapping].to, Some(root));
    }

    #[test]
    fn test_unknown_target_counts_as_unresolved() {
        let mut ws = Workspace::new();
        let reg = IdentityRegistry::new();
        let mapping = ws.mappings.insert(Mapping::new(codon_map(), None));
        let mut queue = ForwardRefQueue::new();
        queue.push(ForwardReference::MappingTarget {
            mapping,
            target_id: "nowhere".into(),
        });
        let report = queue.resolve_all(&reg, &mut ws);
        assert_eq!(report, ResolutionReport { resolved: 0, unresolved: 1, failed: 0 });
        assert_eq!(queue.len(), 1);
        assert_eq!(ws.mappings[mapping].to, None);
    }

    #[test]
    fn test_codon_frame_needs_resolved_mapping() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let dna = ws.add_sequence(Sequence::new("d", "ATGAAA"));
        reg.register_sequence("sq1", dna);
        let mapping = ws.mappings.insert(Mapping::new(codon_map(), None));
        let frame = ws.codon_frames.insert(CodonFrame::default());

        let mut queue = ForwardRefQueue::new();
        queue.push(ForwardReference::CodonFrameTarget {
            frame,
            mapping,
            target_id: "sq1".into(),
        });
        let report = queue.resolve_all(&reg, &mut ws);
        assert_eq!(report.failed, 1);
        assert!(ws.codon_frames[frame].is_empty());
    }

    #[test]
    fn test_single_pass_resolves_mapping_then_frame_in_queue_order() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let mapping = ws.mappings.insert(Mapping::new(codon_map(), None));
        let frame = ws.codon_frames.insert(CodonFrame::default());
        let mut queue = ForwardRefQueue::new();
        queue.push(ForwardReference::MappingTarget {
            mapping,
            target_id: "sq2".into(),
        });
        queue.push(ForwardReference::CodonFrameTarget {
            frame,
            mapping,
            target_id: "sq1".into(),
        });
        let dna = ws.add_sequence(Sequence::new("d", "ATGAAA"));
        let prot = ws.add_sequence(Sequence::new("p", "MK"));
        reg.register_sequence("sq1", dna);
        reg.register_sequence("sq2", prot);

        let report = queue.resolve_all(&reg, &mut ws);
        assert_eq!(report.resolved, 2);
        assert_eq!(report.remaining(), 0);
        assert_eq!(ws.codon_frames[frame].mappings.len(), 1);
        assert_eq!(ws.codon_frames[frame].mappings[0].dna, dna);
    }
}
