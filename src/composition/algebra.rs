// Copyright 2025 Cowboy AI, LLC.

//! Composition algebra over selectors, treatments and forwarding objectives
//!
//! All functions are pure. An impossible composition is `None`, not an error:
//! the pair simply contributes nothing to the composed table.
//!
//! - **Parallel** (`+`): both applications see every packet; the composed rule
//!   matches the intersection and applies both treatments.
//! - **Sequential** (`>`): the right application sees packets as the left one
//!   rewrote them; the right selector is pulled back through the left treatment
//!   before intersecting.
//! - **Override** (`/`): the left application's rules win; they are lifted by
//!   an addend so ties resolve towards the left.

use crate::objective::{ForwardingObjective, TrafficSelector, TrafficTreatment};

/// Intersect two selectors criterion type by criterion type
///
/// Types present on one side only pass through unchanged. Returns `None`
/// when a shared type has no common value.
pub fn intersect_selector(a: &TrafficSelector, b: &TrafficSelector) -> Option<TrafficSelector> {
    let mut result = a.clone();
    for criterion in b.criteria() {
        match a.get(criterion.criterion_type()) {
            Some(existing) => result.insert(existing.intersect(criterion)?),
            None => result.insert(criterion.clone()),
        }
    }
    Some(result)
}

/// `a`'s instructions followed by `b`'s, without deduplication
pub fn union_treatment(a: &TrafficTreatment, b: &TrafficTreatment) -> TrafficTreatment {
    a.concat(b)
}

/// Pull a downstream selector back through an upstream treatment
///
/// Walks the treatment's field rewrites from last to first. A rewrite that
/// satisfies the downstream constraint on its field consumes that constraint;
/// a rewrite that contradicts it makes the composition impossible. Output,
/// group, table and metadata instructions do not touch header fields.
pub fn revert_selector_through_treatment(
    treatment: &TrafficTreatment,
    selector: &TrafficSelector,
) -> Option<TrafficSelector> {
    let mut remaining = selector.clone();
    for instruction in treatment.instructions().iter().rev() {
        let Some(modification) = instruction.modification() else {
            continue;
        };
        let target = modification.target();
        if let Some(criterion) = remaining.get(target) {
            if !modification.satisfies(criterion) {
                return None;
            }
            remaining.remove(target);
        }
    }
    Some(remaining)
}

/// Parallel composition: intersect selectors, join treatments, add priorities
pub fn compose_parallel(
    fo1: &ForwardingObjective,
    fo2: &ForwardingObjective,
) -> Option<ForwardingObjective> {
    let selector = intersect_selector(fo1.selector(), fo2.selector())?;
    let treatment = union_treatment(fo1.treatment(), fo2.treatment());
    let priority = fo1.priority().saturating_add(fo2.priority());
    Some(combine(fo1, fo2, selector, treatment, priority))
}

/// Sequential composition: `fo2` applies to packets after `fo1` rewrote them
pub fn compose_sequential(
    fo1: &ForwardingObjective,
    fo2: &ForwardingObjective,
    priority_multiplier: i32,
) -> Option<ForwardingObjective> {
    let reverted = revert_selector_through_treatment(fo1.treatment(), fo2.selector())?;
    let selector = intersect_selector(fo1.selector(), &reverted)?;
    let treatment = union_treatment(fo1.treatment(), fo2.treatment());
    let priority = fo1
        .priority()
        .saturating_mul(priority_multiplier)
        .saturating_add(fo2.priority());
    Some(combine(fo1, fo2, selector, treatment, priority))
}

/// Override composition: the same objective lifted by `priority_addend`
pub fn compose_override(fo: &ForwardingObjective, priority_addend: i32) -> ForwardingObjective {
    fo.to_builder()
        .with_priority(fo.priority().saturating_add(priority_addend))
        .add()
}

/// Build the composed ADD objective
///
/// Ownership and flag come from the left operand. The result is permanent
/// only if both operands are; otherwise it takes the shortest timeout.
fn combine(
    fo1: &ForwardingObjective,
    fo2: &ForwardingObjective,
    selector: TrafficSelector,
    treatment: TrafficTreatment,
    priority: i32,
) -> ForwardingObjective {
    let builder = fo1
        .to_builder()
        .with_selector(selector)
        .with_treatment(treatment)
        .with_priority(priority);
    let builder = match fo1.next_id().or(fo2.next_id()) {
        Some(next_id) => builder.next_step(next_id),
        None => builder,
    };
    let builder = match (fo1.is_permanent(), fo2.is_permanent()) {
        (true, true) => builder.make_permanent(),
        (false, true) => builder.make_temporary(fo1.timeout()),
        (true, false) => builder.make_temporary(fo2.timeout()),
        (false, false) => builder.make_temporary(fo1.timeout().min(fo2.timeout())),
    };
    builder.add()
}
