//! Reactive field dependencies.
//!
//! Edges run from a watched field to a dependent field. When the watched
//! value changes, every field downstream of it is recomputed from all of its
//! incoming edges, in topological order. Reset effects clear their
//! dependents before any state is recomputed. The graph is checked for cycles when it
//! is built, so a change always settles.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use medform_core::FieldValue;
use serde::Serialize;

use crate::context::{FieldState, FormContext};
use crate::error::FormError;
use crate::field::FieldId;

/// What an active edge does to its dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Dependent is required while the condition holds.
    SetRequired,
    /// Dependent is visible only while the condition holds.
    SetVisible,
    /// Dependent is disabled while the condition holds.
    SetDisabled,
    /// Dependent's value is cleared when the condition holds.
    ResetValue,
}

/// Predicate over the watched field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Filled,
    Empty,
    Equals(FieldValue),
    /// Coded value is one of these codes.
    CodeIn(Vec<String>),
    IsTrue,
}

impl Condition {
    pub fn holds(&self, value: &FieldValue) -> bool {
        match self {
            Condition::Filled => !value.is_empty(),
            Condition::Empty => value.is_empty(),
            Condition::Equals(expected) => value == expected,
            Condition::CodeIn(codes) => match value {
                FieldValue::Code(code) => codes.iter().any(|c| c == code),
                _ => false,
            },
            Condition::IsTrue => matches!(value, FieldValue::Boolean(true)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependencyEdge {
    pub watched: FieldId,
    pub dependent: FieldId,
    pub condition: Condition,
    pub effect: Effect,
}

impl DependencyEdge {
    pub fn new(watched: &str, condition: Condition, effect: Effect, dependent: &str) -> Self {
        Self {
            watched: FieldId::from(watched),
            dependent: FieldId::from(dependent),
            condition,
            effect,
        }
    }
}

/// One recomputed field state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub field: FieldId,
    pub before: FieldState,
    pub after: FieldState,
}

impl StateChange {
    pub fn required_flipped(&self) -> bool {
        self.before.required != self.after.required
    }
}

/// Everything one change caused.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    pub state_changes: Vec<StateChange>,
    /// Dependents whose value was cleared.
    pub reset: Vec<FieldId>,
    /// Fields re-validated because their required flag changed or because
    /// they were edited.
    pub revalidated: Vec<FieldId>,
}

impl ChangeReport {
    pub fn required_flips(&self) -> impl Iterator<Item = &StateChange> {
        self.state_changes.iter().filter(|c| c.required_flipped())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<DependencyEdge>,
    /// watched → indexes into `edges`
    outgoing: BTreeMap<FieldId, Vec<usize>>,
    /// dependent → indexes into `edges`
    incoming: BTreeMap<FieldId, Vec<usize>>,
    /// Position of each field in topological order.
    rank: BTreeMap<FieldId, usize>,
}

impl DependencyGraph {
    /// Build the graph, rejecting cycles.
    pub fn new(edges: Vec<DependencyEdge>) -> Result<Self, FormError> {
        let mut outgoing: BTreeMap<FieldId, Vec<usize>> = BTreeMap::new();
        let mut incoming: BTreeMap<FieldId, Vec<usize>> = BTreeMap::new();
        for (i, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.watched.clone()).or_default().push(i);
            incoming.entry(edge.dependent.clone()).or_default().push(i);
        }

        let rank = topological_order(&edges)?
            .into_iter()
            .enumerate()
            .map(|(i, field)| (field, i))
            .collect();

        Ok(Self {
            edges,
            outgoing,
            incoming,
            rank,
        })
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Fields that have at least one incoming edge.
    pub fn dependents(&self) -> impl Iterator<Item = &FieldId> {
        self.incoming.keys()
    }

    /// Direct dependents of `watched`, each once, in edge order.
    pub fn direct_dependents(&self, watched: &FieldId) -> Vec<FieldId> {
        let mut seen = BTreeSet::new();
        self.outgoing
            .get(watched)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i].dependent)
            .filter(|d| seen.insert((*d).clone()))
            .cloned()
            .collect()
    }

    /// Every field downstream of `changed`, in topological order.
    fn downstream(&self, changed: &FieldId) -> Vec<FieldId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([changed.clone()]);
        while let Some(watched) = queue.pop_front() {
            for dependent in self.direct_dependents(&watched) {
                if seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        let mut fields: Vec<FieldId> = seen.into_iter().collect();
        fields.sort_by_key(|f| self.rank.get(f).copied().unwrap_or(usize::MAX));
        fields
    }

    /// State of `field` as implied by its base state and every incoming edge.
    pub fn derive_state(&self, ctx: &FormContext, field: &FieldId) -> FieldState {
        let mut state = ctx.base_state(field);
        for &i in self.incoming.get(field).into_iter().flatten() {
            let edge = &self.edges[i];
            let active = edge.condition.holds(ctx.value(&edge.watched));
            match edge.effect {
                Effect::SetRequired => state.required |= active,
                Effect::SetVisible => state.visible &= active,
                Effect::SetDisabled => state.disabled |= active,
                Effect::ResetValue => {}
            }
        }
        state
    }

    /// Set every dependent's state from the current values. Used once after
    /// population; never resets values.
    pub fn initialize(&self, ctx: &mut FormContext) {
        for field in self.incoming.keys() {
            let state = self.derive_state(ctx, field);
            ctx.set_state(field, state);
        }
    }

    /// Propagate a change of `changed` through everything downstream of it.
    ///
    /// All reset effects run first, in topological order, so a reset that
    /// feeds another reset is seen. States are then recomputed once per
    /// field from the settled values. `revalidate` is called once for every
    /// field whose value was reset or whose required flag flipped.
    pub fn apply_change(
        &self,
        ctx: &mut FormContext,
        changed: &FieldId,
        mut revalidate: impl FnMut(&mut FormContext, &FieldId),
    ) -> ChangeReport {
        let mut report = ChangeReport::default();
        let affected = self.downstream(changed);

        let mut moved: BTreeSet<FieldId> = BTreeSet::from([changed.clone()]);
        for field in &affected {
            let cause = self.incoming.get(field).into_iter().flatten().find_map(|&i| {
                let edge = &self.edges[i];
                (edge.effect == Effect::ResetValue
                    && moved.contains(&edge.watched)
                    && edge.condition.holds(ctx.value(&edge.watched)))
                .then_some(&edge.watched)
            });
            if let Some(cause) = cause
                && !ctx.value(field).is_empty()
            {
                tracing::debug!(field = %field, cause = %cause, "dependent value reset");
                ctx.reset(field);
                report.reset.push(field.clone());
                moved.insert(field.clone());
            }
        }

        for field in &affected {
            let before = ctx.state(field);
            let after = self.derive_state(ctx, field);
            let flipped = before.required != after.required;
            if before != after {
                ctx.set_state(field, after);
                report.state_changes.push(StateChange {
                    field: field.clone(),
                    before,
                    after,
                });
            }
            if flipped || report.reset.contains(field) {
                revalidate(ctx, field);
                report.revalidated.push(field.clone());
            }
        }

        report
    }
}

/// Kahn's algorithm; whatever cannot be ordered sits on a cycle.
fn topological_order(edges: &[DependencyEdge]) -> Result<Vec<FieldId>, FormError> {
    let mut nodes: BTreeSet<&FieldId> = BTreeSet::new();
    let mut in_degree: BTreeMap<&FieldId, usize> = BTreeMap::new();
    let mut adjacency: BTreeMap<&FieldId, BTreeSet<&FieldId>> = BTreeMap::new();

    for edge in edges {
        nodes.insert(&edge.watched);
        nodes.insert(&edge.dependent);
        if adjacency
            .entry(&edge.watched)
            .or_default()
            .insert(&edge.dependent)
        {
            *in_degree.entry(&edge.dependent).or_default() += 1;
        }
    }

    let mut queue: VecDeque<&FieldId> = nodes
        .iter()
        .copied()
        .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
        .collect();
    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(node) = queue.pop_front() {
        ordered.push(node.clone());
        for &next in adjacency.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if ordered.len() == nodes.len() {
        return Ok(ordered);
    }

    let stuck = nodes
        .into_iter()
        .filter(|n| in_degree.get(n).copied().unwrap_or(0) > 0)
        .map(|n| n.to_string())
        .collect();
    Err(FormError::DependencyCycle(stuck))
}
