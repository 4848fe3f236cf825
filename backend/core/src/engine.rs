//! Resolution engine.
//!
//! Walks the caller's field tree against the schema registry. Every field is
//! looked up on the current shape, its arguments are checked, the optional
//! `selector` narrows the current node, and the field's capability produces
//! either a scalar or new nodes to recurse into. The value tree mirrors the
//! shape of the request.

use std::collections::HashSet;

use futures::future::join_all;
use graphql_parser::query::{Selection as AstSelection, TypeCondition};
use graphql_parser::Pos;
use scraper::Html;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::FieldError;
use crate::node::Node;
use crate::protocol::{Location, PathSegment, QueryRequest, Response, ResponseError};
use crate::query::{AstArgumentValue, AstField, AstSelectionSet, PreparedQuery};
use crate::schema::{Capability, FieldDef, Schema, ShapeKind, TypeDef, SELECTOR_ARG};
use crate::selection::Selection;
use crate::source::DocumentSource;

/// Meta field answered by every object type.
pub const TYPENAME_FIELD: &str = "__typename";

/// A node tagged with the schema shape it is being resolved as.
#[derive(Debug, Clone)]
pub enum NodeValue<N> {
    Document(N),
    Element(N),
}

impl<N: Node> NodeValue<N> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            NodeValue::Document(_) => ShapeKind::Document,
            NodeValue::Element(_) => ShapeKind::Element,
        }
    }

    pub fn node(&self) -> &N {
        match self {
            NodeValue::Document(node) | NodeValue::Element(node) => node,
        }
    }
}

/// Executes prepared queries against a schema and a document source.
pub struct Executor<'s> {
    schema: &'s Schema,
    source: &'s dyn DocumentSource,
}

impl<'s> Executor<'s> {
    pub fn new(schema: &'s Schema, source: &'s dyn DocumentSource) -> Self {
        Self { schema, source }
    }

    pub async fn execute(&self, request: &QueryRequest) -> Response {
        match PreparedQuery::prepare(request) {
            Ok(query) => self.execute_prepared(&query).await,
            Err(err) => {
                debug!(error = %err, "Query rejected");
                Response::from(err)
            }
        }
    }

    /// Resolve every root field. Root `page` fields are fetched concurrently;
    /// each document is resolved as soon as its markup is available.
    #[instrument(skip_all, fields(operation = query.operation_name().unwrap_or("anonymous")))]
    pub async fn execute_prepared(&self, query: &PreparedQuery) -> Response {
        let query_type = self.schema.query_type();
        let mut root = Resolver::new(self.schema, query);
        let fields = root.collect_fields(query_type, &[query.selection_set()], &[]);

        let mut slots = Vec::with_capacity(fields.len());
        let mut pending = Vec::new();
        for field in &fields {
            let path = vec![PathSegment::Key(field.key.to_string())];
            match root.root_field(query_type, field, &path) {
                RootSlot::Ready(value) => slots.push(Some(value)),
                RootSlot::Page(url) => {
                    slots.push(None);
                    pending.push(self.resolve_page(query, field, url, path));
                }
            }
        }

        let mut pages = join_all(pending).await.into_iter();
        let mut data = Map::new();
        let mut errors = root.errors;
        for (field, slot) in fields.iter().zip(slots) {
            let value = match slot {
                Some(value) => value,
                None => match pages.next() {
                    Some(page) => {
                        errors.extend(page.errors);
                        page.value
                    }
                    None => Value::Null,
                },
            };
            data.insert(field.key.to_string(), value);
        }

        debug!(fields = data.len(), errors = errors.len(), "Query resolved");
        Response {
            data: Some(Value::Object(data)),
            errors,
        }
    }

    async fn resolve_page(
        &self,
        query: &PreparedQuery,
        field: &CollectedField<'_>,
        url: String,
        path: Vec<PathSegment>,
    ) -> Resolved {
        match self.source.fetch(&url).await {
            Ok(markup) => resolve_markup(self.schema, query, &markup, &field.selection_sets, &path),
            Err(source) => {
                warn!(error = %source, "Document fetch failed");
                let mut resolver = Resolver::new(self.schema, query);
                resolver.report(FieldError::Fetch { url, source }, field.field.position, &path);
                Resolved {
                    value: Value::Null,
                    errors: resolver.errors,
                }
            }
        }
    }
}

/// Resolve the sub-selection of one `page` field against already fetched
/// markup. The parsed tree lives only for the duration of this call.
fn resolve_markup<'q>(
    schema: &'q Schema,
    query: &'q PreparedQuery,
    markup: &str,
    selection_sets: &[&'q AstSelectionSet],
    path: &[PathSegment],
) -> Resolved {
    let html = Html::parse_document(markup);
    let mut resolver = Resolver::new(schema, query);
    let root = NodeValue::Document(Selection::document(&html));
    let value = resolver.resolve_object(&root, selection_sets, path);
    Resolved {
        value,
        errors: resolver.errors,
    }
}

struct Resolved {
    value: Value,
    errors: Vec<ResponseError>,
}

enum RootSlot {
    Ready(Value),
    Page(String),
}

/// Every selection sharing one response key, merged.
struct CollectedField<'q> {
    key: &'q str,
    field: &'q AstField,
    selection_sets: Vec<&'q AstSelectionSet>,
    /// Another selection claimed the same key with a different field or
    /// arguments; the key resolves to null.
    conflicted: bool,
}

/// Checked arguments of one field; null and absent arguments are omitted.
struct Arguments {
    values: Vec<(&'static str, String)>,
}

impl Arguments {
    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn child_path(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut out = Vec::with_capacity(path.len() + 1);
    out.extend_from_slice(path);
    out.push(segment);
    out
}

/// Why two selections cannot share one response key, if they cannot.
fn conflict_reason(first: &AstField, other: &AstField) -> Option<String> {
    if first.name != other.name {
        return Some(format!(
            "\"{}\" and \"{}\" are different fields",
            first.name, other.name
        ));
    }
    let same_args = first.arguments.len() == other.arguments.len()
        && first.arguments.iter().all(|arg| other.arguments.contains(arg));
    (!same_args).then(|| "they have differing arguments".to_string())
}

fn scalar(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

/// Synchronous resolution state for one document (or the root level).
struct Resolver<'q> {
    schema: &'q Schema,
    query: &'q PreparedQuery,
    errors: Vec<ResponseError>,
}

impl<'q> Resolver<'q> {
    fn new(schema: &'q Schema, query: &'q PreparedQuery) -> Self {
        Self {
            schema,
            query,
            errors: Vec::new(),
        }
    }

    fn report(&mut self, err: FieldError, position: Pos, path: &[PathSegment]) {
        self.errors.push(ResponseError {
            message: err.to_string(),
            locations: vec![Location {
                line: position.line,
                column: position.column,
            }],
            path: path.to_vec(),
        });
    }

    fn collect_fields(
        &mut self,
        ty: &TypeDef,
        selection_sets: &[&'q AstSelectionSet],
        path: &[PathSegment],
    ) -> Vec<CollectedField<'q>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for set in selection_sets {
            self.collect_into(ty, set, path, &mut out, &mut visited);
        }
        out
    }

    fn collect_into(
        &mut self,
        ty: &TypeDef,
        set: &'q AstSelectionSet,
        path: &[PathSegment],
        out: &mut Vec<CollectedField<'q>>,
        visited: &mut HashSet<&'q str>,
    ) {
        let query = self.query;
        for selection in &set.items {
            let (directives, position) = match selection {
                AstSelection::Field(f) => (&f.directives, f.position),
                AstSelection::FragmentSpread(s) => (&s.directives, s.position),
                AstSelection::InlineFragment(i) => (&i.directives, i.position),
            };
            match query.is_included(directives) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    self.report(err, position, path);
                    continue;
                }
            }

            match selection {
                AstSelection::Field(field) => {
                    let key = field.alias.as_deref().unwrap_or(&field.name);
                    match out.iter_mut().find(|c| c.key == key) {
                        Some(existing) => match conflict_reason(existing.field, field) {
                            None => existing.selection_sets.push(&field.selection_set),
                            Some(reason) => {
                                existing.conflicted = true;
                                let key_path = child_path(path, PathSegment::Key(key.to_string()));
                                self.report(
                                    FieldError::FieldConflict {
                                        key: key.to_string(),
                                        reason,
                                    },
                                    field.position,
                                    &key_path,
                                );
                            }
                        },
                        None => out.push(CollectedField {
                            key,
                            field,
                            selection_sets: vec![&field.selection_set],
                            conflicted: false,
                        }),
                    }
                }
                AstSelection::FragmentSpread(spread) => {
                    if !visited.insert(spread.fragment_name.as_str()) {
                        continue;
                    }
                    let Some(fragment) = query.fragment(&spread.fragment_name) else {
                        self.report(
                            FieldError::UnknownFragment(spread.fragment_name.clone()),
                            spread.position,
                            path,
                        );
                        continue;
                    };
                    let TypeCondition::On(condition) = &fragment.type_condition;
                    if self.schema.type_by_name(condition).is_none() {
                        self.report(
                            FieldError::UnknownType(condition.clone()),
                            fragment.position,
                            path,
                        );
                        continue;
                    }
                    if ty.matches_condition(condition) {
                        self.collect_into(ty, &fragment.selection_set, path, out, visited);
                    }
                }
                AstSelection::InlineFragment(inline) => {
                    let applies = match &inline.type_condition {
                        Some(TypeCondition::On(condition)) => {
                            if self.schema.type_by_name(condition).is_none() {
                                self.report(
                                    FieldError::UnknownType(condition.clone()),
                                    inline.position,
                                    path,
                                );
                                continue;
                            }
                            ty.matches_condition(condition)
                        }
                        None => true,
                    };
                    if applies {
                        self.collect_into(ty, &inline.selection_set, path, out, visited);
                    }
                }
            }
        }
    }

    fn arguments(
        &self,
        ty: &TypeDef,
        def: &FieldDef,
        field: &AstField,
    ) -> Result<Arguments, FieldError> {
        let mut values = Vec::new();
        for (name, literal) in &field.arguments {
            let Some(arg) = def.arg(name) else {
                return Err(FieldError::UnknownArgument {
                    argument: name.clone(),
                    field: def.name.to_string(),
                    type_name: ty.name().to_string(),
                });
            };
            // Enum literals are bare names, never strings.
            if let AstArgumentValue::Enum(bare) = literal {
                return Err(FieldError::InvalidArgument {
                    argument: name.clone(),
                    field: def.name.to_string(),
                    reason: format!("Expected type String, found {bare}."),
                });
            }
            match self.query.resolve_value(literal)? {
                Value::Null => {}
                Value::String(s) => values.push((arg.name, s)),
                other => {
                    return Err(FieldError::InvalidArgument {
                        argument: name.clone(),
                        field: def.name.to_string(),
                        reason: format!("expected a String, found {other}"),
                    })
                }
            }
        }

        for arg in def.args.iter().filter(|a| a.ty.is_required()) {
            if !values.iter().any(|(n, _)| *n == arg.name) {
                return Err(FieldError::MissingArgument {
                    argument: arg.name.to_string(),
                    field: def.name.to_string(),
                    type_name: ty.name().to_string(),
                });
            }
        }
        Ok(Arguments { values })
    }

    /// Root-level fields either resolve immediately or name a page to fetch.
    fn root_field(
        &mut self,
        ty: &TypeDef,
        field: &CollectedField<'q>,
        path: &[PathSegment],
    ) -> RootSlot {
        if field.conflicted {
            return RootSlot::Ready(Value::Null);
        }
        let name = field.field.name.as_str();
        if name == TYPENAME_FIELD {
            return RootSlot::Ready(Value::String(ty.name().to_string()));
        }
        let Some(def) = ty.field(name) else {
            self.unknown_field(ty, field, path);
            return RootSlot::Ready(Value::Null);
        };
        match self.arguments(ty, def, field.field) {
            Ok(args) if def.capability == Capability::Page => {
                RootSlot::Page(args.get("url").unwrap_or_default().to_string())
            }
            Ok(_) => RootSlot::Ready(Value::Null),
            Err(err) => {
                self.report(err, field.field.position, path);
                RootSlot::Ready(Value::Null)
            }
        }
    }

    fn unknown_field(&mut self, ty: &TypeDef, field: &CollectedField<'q>, path: &[PathSegment]) {
        self.report(
            FieldError::UnknownField {
                field: field.field.name.clone(),
                type_name: ty.name().to_string(),
            },
            field.field.position,
            path,
        );
    }

    fn resolve_object<N: Node>(
        &mut self,
        value: &NodeValue<N>,
        selection_sets: &[&'q AstSelectionSet],
        path: &[PathSegment],
    ) -> Value {
        let schema = self.schema;
        let ty = schema.type_def(value.kind());
        let fields = self.collect_fields(ty, selection_sets, path);

        let mut out = Map::new();
        for field in &fields {
            let field_path = child_path(path, PathSegment::Key(field.key.to_string()));
            let resolved = self.resolve_field(ty, value.node(), field, &field_path);
            out.insert(field.key.to_string(), resolved);
        }
        Value::Object(out)
    }

    fn resolve_field<N: Node>(
        &mut self,
        ty: &TypeDef,
        current: &N,
        field: &CollectedField<'q>,
        path: &[PathSegment],
    ) -> Value {
        if field.conflicted {
            return Value::Null;
        }
        let name = field.field.name.as_str();
        if name == TYPENAME_FIELD {
            return Value::String(ty.name().to_string());
        }
        let Some(def) = ty.field(name) else {
            self.unknown_field(ty, field, path);
            return Value::Null;
        };

        let resolved = self
            .arguments(ty, def, field.field)
            .and_then(|args| self.invoke(def, &args, current, field, path));
        match resolved {
            Ok(value) => value,
            Err(err) => {
                self.report(err, field.field.position, path);
                Value::Null
            }
        }
    }

    fn invoke<N: Node>(
        &mut self,
        def: &FieldDef,
        args: &Arguments,
        current: &N,
        field: &CollectedField<'q>,
        path: &[PathSegment],
    ) -> Result<Value, FieldError> {
        if def.capability == Capability::Descendants {
            let selector = args.get(SELECTOR_ARG).unwrap_or_default();
            let matches = current.descendants(selector)?;
            return Ok(self.resolve_list(matches, field, path));
        }

        let node = match args.get(SELECTOR_ARG) {
            Some(selector) => current.narrow(selector)?,
            None => current.clone(),
        };

        Ok(match def.capability {
            Capability::InnerMarkup => scalar(node.inner_markup()),
            Capability::OuterMarkup => scalar(node.outer_markup()),
            Capability::Text => scalar(node.text()),
            Capability::TagName => scalar(node.tag_name()),
            Capability::Attribute => scalar(args.get("name").and_then(|n| node.attribute(n))),
            Capability::Title => scalar(node.narrow("title")?.text()),
            Capability::NextSibling => {
                let sibling = node.next_sibling();
                if sibling.is_empty() {
                    Value::Null
                } else {
                    self.resolve_object(&NodeValue::Element(sibling), &field.selection_sets, path)
                }
            }
            Capability::NextSiblings => self.resolve_list(node.next_siblings().split(), field, path),
            // Handled above / only reachable from the root type.
            Capability::Descendants | Capability::Page => Value::Null,
        })
    }

    fn resolve_list<N: Node>(
        &mut self,
        nodes: Vec<N>,
        field: &CollectedField<'q>,
        path: &[PathSegment],
    ) -> Value {
        let mut items = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.into_iter().enumerate() {
            let item_path = child_path(path, PathSegment::Index(index));
            items.push(self.resolve_object(
                &NodeValue::Element(node),
                &field.selection_sets,
                &item_path,
            ));
        }
        Value::Array(items)
    }
}
