use std::collections::BTreeSet;

use medform_core::{FieldValue, Path};

use crate::context::FormContext;
use crate::dependency::{ChangeReport, DependencyEdge, DependencyGraph};
use crate::error::FormError;
use crate::field::{Derived, FieldId, FieldSpec};
use crate::validation::{self, Constraint, ValidationIssue};

/// Everything a form knows about its fields: paths, derived writes,
/// dependencies and constraints. Built once, shared read-only.
#[derive(Debug, Clone)]
pub struct FormDefinition {
    name: String,
    resource: Path,
    repeatable: bool,
    fields: Vec<FieldSpec>,
    derived: Vec<Derived>,
    graph: DependencyGraph,
    constraints: Vec<Constraint>,
}

impl FormDefinition {
    pub fn builder(name: &str, resource: Path) -> FormBuilder {
        FormBuilder {
            name: name.to_string(),
            resource,
            repeatable: false,
            fields: Vec::new(),
            derived: Vec::new(),
            edges: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource path used in fragment keys for this form.
    pub fn resource(&self) -> &Path {
        &self.resource
    }

    /// Whether the form edits a list of entries rather than one fragment.
    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id.as_str() == id)
    }

    pub fn require_field(&self, id: &str) -> Result<&FieldSpec, FormError> {
        self.field(id)
            .ok_or_else(|| FormError::UnknownField(id.to_string()))
    }

    pub fn derived(&self) -> &[Derived] {
        &self.derived
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Vocabulary ids the coded fields resolve against.
    pub fn vocabularies(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .filter_map(|f| f.kind.vocabulary())
            .collect()
    }

    /// Fresh context with dependency states initialized.
    pub fn new_context(&self) -> FormContext {
        let mut ctx = FormContext::new(self);
        self.graph.initialize(&mut ctx);
        ctx
    }

    /// Re-validate one field and record the result on the context.
    pub fn revalidate(&self, ctx: &mut FormContext, id: &FieldId) -> Option<ValidationIssue> {
        let spec = self.field(id.as_str())?;
        let issue = validation::validate_field(spec, &self.constraints, ctx);
        ctx.set_issue(id, issue.clone());
        issue
    }

    /// Validate every field, recording results on the context.
    pub fn validate_all(&self, ctx: &mut FormContext) -> Vec<ValidationIssue> {
        self.fields
            .iter()
            .filter_map(|f| self.revalidate(ctx, &f.id))
            .collect()
    }

    /// Store a user edit and propagate it.
    ///
    /// Runs the dependency pass, re-validates the edited field, and
    /// re-checks every field whose constraint reads the edited one.
    pub fn set_value(
        &self,
        ctx: &mut FormContext,
        id: &str,
        value: FieldValue,
    ) -> Result<ChangeReport, FormError> {
        let spec = self.require_field(id)?;
        if !spec.kind.accepts(&value) {
            return Err(FormError::KindMismatch {
                field: id.to_string(),
                kind: spec.kind.name(),
            });
        }

        let field = spec.id.clone();
        ctx.set_value(&field, value);

        let mut report = self.graph.apply_change(ctx, &field, |ctx, dependent| {
            self.revalidate(ctx, dependent);
        });

        self.revalidate(ctx, &field);
        report.revalidated.push(field.clone());

        let partners: BTreeSet<FieldId> = self
            .constraints
            .iter()
            .filter(|c| c.reads == field)
            .map(|c| c.field.clone())
            .collect();
        for partner in partners {
            self.revalidate(ctx, &partner);
            report.revalidated.push(partner);
        }

        Ok(report)
    }
}

pub struct FormBuilder {
    name: String,
    resource: Path,
    repeatable: bool,
    fields: Vec<FieldSpec>,
    derived: Vec<Derived>,
    edges: Vec<DependencyEdge>,
    constraints: Vec<Constraint>,
}

impl FormBuilder {
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn derived(mut self, derived: Derived) -> Self {
        self.derived.push(derived);
        self
    }

    pub fn edge(mut self, edge: DependencyEdge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Check field ids are unique and every edge/constraint names a known
    /// field, then build the (acyclic) dependency graph.
    pub fn build(self) -> Result<FormDefinition, FormError> {
        let mut ids = BTreeSet::new();
        for field in &self.fields {
            if !ids.insert(field.id.clone()) {
                return Err(FormError::DuplicateField(field.id.to_string()));
            }
        }

        let referenced = self
            .edges
            .iter()
            .flat_map(|e| [&e.watched, &e.dependent])
            .chain(self.constraints.iter().flat_map(|c| [&c.field, &c.reads]));
        for id in referenced {
            if !ids.contains(id) {
                return Err(FormError::UnknownField(id.to_string()));
            }
        }

        let graph = DependencyGraph::new(self.edges)?;

        Ok(FormDefinition {
            name: self.name,
            resource: self.resource,
            repeatable: self.repeatable,
            fields: self.fields,
            derived: self.derived,
            graph,
            constraints: self.constraints,
        })
    }
}
