//! Lowering of the syntax tree into layout descriptors
//!
//! Top-level declarations are compiled in declaration order. A field type is
//! either a primitive or a structure/union compiled earlier in the same text;
//! forward references fail the whole compile step. Anonymous structures
//! declared inline inside a union are compiled first as independent named
//! structures, named after the member that holds them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use super::ast::{Ast, NodeId, NodeKind, TypeRef};
use super::naming::{normalize_field_name, snake_to_camel};
use crate::types::{FieldKind, FieldLayout, Layout, LayoutKind, PrimitiveType, Shape};
use crate::{Result, TelemetryError};

/// Compile every named declaration in `ast`, in declaration order.
pub(crate) fn compile(ast: &Ast) -> Result<Vec<Arc<Layout>>> {
    let mut compiler = Compiler { ast, layouts: Vec::new(), by_name: HashMap::new(), open: HashSet::new() };

    for (id, node) in ast.children(ast.root()) {
        match &node.kind {
            NodeKind::Structure { name: Some(name) } => {
                compiler.compile_layout(name, id, LayoutKind::Struct)?;
            }
            NodeKind::Structure { name: None } => {
                debug!(line = node.line, "Skipping anonymous top-level structure");
            }
            NodeKind::Union { name } => {
                compiler.compile_layout(name, id, LayoutKind::Union)?;
            }
            NodeKind::Spec | NodeKind::Field { .. } => {
                return Err(TelemetryError::spec_syntax(node.line, "expected a structure or union"));
            }
        }
    }

    Ok(compiler.layouts)
}

struct Compiler<'a> {
    ast: &'a Ast,
    layouts: Vec<Arc<Layout>>,
    by_name: HashMap<String, Arc<Layout>>,
    /// Declarations whose fields are still being compiled
    open: HashSet<String>,
}

impl Compiler<'_> {
    fn compile_layout(&mut self, name: &str, id: NodeId, kind: LayoutKind) -> Result<Arc<Layout>> {
        let ast = self.ast;
        let node = ast.node(id);

        if self.by_name.contains_key(name)
            || self.open.contains(name)
            || PrimitiveType::from_spec_name(name).is_some()
        {
            return Err(TelemetryError::spec_syntax(
                node.line,
                format!("type '{}' is declared more than once", name),
            ));
        }

        self.open.insert(name.to_string());
        let fields = self.compile_fields(name, id, kind);
        self.open.remove(name);
        let fields = fields?;

        let layout = Layout::new(name, kind, fields);
        layout.validate()?;
        trace!(name, size = layout.size, fields = layout.field_count(), "Compiled layout");

        let layout = Arc::new(layout);
        self.by_name.insert(name.to_string(), Arc::clone(&layout));
        self.layouts.push(Arc::clone(&layout));
        Ok(layout)
    }

    fn compile_fields(&mut self, name: &str, id: NodeId, kind: LayoutKind) -> Result<Vec<FieldLayout>> {
        let ast = self.ast;
        let node = ast.node(id);
        let mut fields: Vec<FieldLayout> = Vec::with_capacity(node.children.len());
        let mut total = 0usize;
        for (_, child) in ast.children(id) {
            let NodeKind::Field { name: wire_name, ty } = &child.kind else {
                return Err(TelemetryError::spec_syntax(child.line, "expected a field declaration"));
            };

            let field_name = normalize_field_name(wire_name);
            if fields.iter().any(|f| f.name == field_name) {
                return Err(TelemetryError::spec_syntax(
                    child.line,
                    format!("'{}' declares field '{}' more than once", name, field_name),
                ));
            }

            let (field_kind, shape) = match ty {
                TypeRef::Named(ty) => (self.resolve(ty, name)?, Shape::Scalar),
                TypeRef::Array { element, size } => {
                    if *size == 0 {
                        return Err(TelemetryError::spec_syntax(
                            child.line,
                            format!("array '{}' must have at least one element", wire_name),
                        ));
                    }
                    (self.resolve(element, name)?, Shape::Array(*size))
                }
                TypeRef::Inline(inner) => {
                    let synthesized = snake_to_camel(&field_name);
                    let layout = self.compile_layout(&synthesized, *inner, LayoutKind::Struct)?;
                    (FieldKind::Nested(layout), Shape::Scalar)
                }
            };

            let count = match shape {
                Shape::Scalar => 1,
                Shape::Array(len) => len,
            };
            let width = field_kind.width().checked_mul(count).ok_or_else(|| {
                TelemetryError::spec_syntax(child.line, format!("array '{}' is too large", wire_name))
            })?;
            total = match kind {
                LayoutKind::Struct => total.checked_add(width).ok_or_else(|| {
                    TelemetryError::spec_syntax(child.line, format!("'{}' is too large", name))
                })?,
                LayoutKind::Union => total.max(width),
            };

            fields.push(FieldLayout::new(field_name, wire_name.clone(), field_kind, shape));
        }

        Ok(fields)
    }

    fn resolve(&self, ty: &str, referenced_by: &str) -> Result<FieldKind> {
        if let Some(primitive) = PrimitiveType::from_spec_name(ty) {
            return Ok(FieldKind::Primitive(primitive));
        }
        self.by_name
            .get(ty)
            .map(|layout| FieldKind::Nested(Arc::clone(layout)))
            .ok_or_else(|| TelemetryError::unresolved_type(ty, referenced_by))
    }
}
