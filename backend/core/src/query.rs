//! Query preparation: parse the document, pick the operation, coerce
//! variables and index fragments before any field is resolved.

use std::collections::{HashMap, HashSet};

use graphql_parser::query::{
    parse_query, Definition, Directive, FragmentDefinition, OperationDefinition,
    Selection as AstSelection, SelectionSet, Type, Value as AstValue, VariableDefinition,
};
use serde_json::{Map, Number, Value};

use crate::error::{FieldError, QueryError};
use crate::protocol::QueryRequest;

pub type AstSelectionSet = SelectionSet<'static, String>;
pub type AstField = graphql_parser::query::Field<'static, String>;
pub type AstFragment = FragmentDefinition<'static, String>;
pub type AstDirective = Directive<'static, String>;
pub type AstArgumentValue = AstValue<'static, String>;

/// An operation ready for execution. Owns its syntax tree so it can be held
/// across the document fetches of one request.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    operation_name: Option<String>,
    selection_set: AstSelectionSet,
    fragments: HashMap<String, AstFragment>,
    declared: HashSet<String>,
    variables: Map<String, Value>,
}

impl PreparedQuery {
    pub fn prepare(request: &QueryRequest) -> Result<Self, QueryError> {
        let document = parse_query::<String>(&request.query)
            .map_err(|e| QueryError::Parse(e.to_string()))?
            .into_static();

        let mut operations = Vec::new();
        let mut fragments = HashMap::new();
        for definition in document.definitions {
            match definition {
                Definition::Operation(op) => operations.push(op),
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.clone(), fragment);
                }
            }
        }

        check_fragment_cycles(&fragments)?;

        let operation = pick_operation(operations, request.operation_name.as_deref())?;
        let (operation_name, variable_definitions, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => (None, Vec::new(), set),
            OperationDefinition::Query(query) => {
                (query.name, query.variable_definitions, query.selection_set)
            }
            OperationDefinition::Mutation(_) => {
                return Err(QueryError::UnsupportedOperation("mutation"))
            }
            OperationDefinition::Subscription(_) => {
                return Err(QueryError::UnsupportedOperation("subscription"))
            }
        };

        let variables = coerce_variables(&variable_definitions, request.variables.as_ref())?;
        let declared = variable_definitions.into_iter().map(|d| d.name).collect();

        Ok(Self {
            operation_name,
            selection_set,
            fragments,
            declared,
            variables,
        })
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn selection_set(&self) -> &AstSelectionSet {
        &self.selection_set
    }

    pub fn fragment(&self, name: &str) -> Option<&AstFragment> {
        self.fragments.get(name)
    }

    /// Evaluate an argument literal, substituting variables. A declared
    /// variable that was not provided evaluates to null.
    pub fn resolve_value(&self, value: &AstArgumentValue) -> Result<Value, FieldError> {
        to_json(value, &mut |name| {
            if self.declared.contains(name) {
                Ok(self.variables.get(name).cloned().unwrap_or(Value::Null))
            } else {
                Err(FieldError::UndefinedVariable(name.to_string()))
            }
        })
    }

    /// Apply `@skip(if:)` and `@include(if:)`.
    pub fn is_included(&self, directives: &[AstDirective]) -> Result<bool, FieldError> {
        for directive in directives {
            let skip = match directive.name.as_str() {
                "skip" => true,
                "include" => false,
                other => return Err(FieldError::UnknownDirective(other.to_string())),
            };
            let condition = directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .map(|(_, value)| self.resolve_value(value))
                .transpose()?;
            match condition {
                Some(Value::Bool(flag)) => {
                    if flag == skip {
                        return Ok(false);
                    }
                }
                _ => {
                    return Err(FieldError::InvalidArgument {
                        argument: "if".to_string(),
                        field: format!("@{}", directive.name),
                        reason: "expected a Boolean!".to_string(),
                    })
                }
            }
        }
        Ok(true)
    }
}

fn operation_name<'a>(op: &'a OperationDefinition<'static, String>) -> Option<&'a str> {
    match op {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
    }
}

fn pick_operation(
    mut operations: Vec<OperationDefinition<'static, String>>,
    name: Option<&str>,
) -> Result<OperationDefinition<'static, String>, QueryError> {
    if let Some(name) = name {
        let index = operations
            .iter()
            .position(|op| operation_name(op) == Some(name))
            .ok_or_else(|| QueryError::UnknownOperation(name.to_string()))?;
        return Ok(operations.swap_remove(index));
    }
    match operations.len() {
        0 => Err(QueryError::NoOperation),
        1 => Ok(operations.remove(0)),
        _ => Err(QueryError::AmbiguousOperation),
    }
}

/// Fragments may not spread themselves, directly or through other fragments.
fn check_fragment_cycles(fragments: &HashMap<String, AstFragment>) -> Result<(), QueryError> {
    let mut done = HashSet::new();
    let mut names: Vec<&str> = fragments.keys().map(String::as_str).collect();
    names.sort_unstable();
    for name in names {
        visit_fragment(name, fragments, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

fn visit_fragment<'a>(
    name: &'a str,
    fragments: &'a HashMap<String, AstFragment>,
    stack: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Result<(), QueryError> {
    if done.contains(name) {
        return Ok(());
    }
    if stack.contains(&name) {
        return Err(QueryError::FragmentCycle(name.to_string()));
    }
    // Unknown spreads are reported where they are used.
    let Some(fragment) = fragments.get(name) else {
        return Ok(());
    };

    stack.push(name);
    let mut spreads = Vec::new();
    spread_names(&fragment.selection_set, &mut spreads);
    for spread in spreads {
        visit_fragment(spread, fragments, stack, done)?;
    }
    stack.pop();
    done.insert(name);
    Ok(())
}

fn spread_names<'a>(set: &'a AstSelectionSet, out: &mut Vec<&'a str>) {
    for item in &set.items {
        match item {
            AstSelection::Field(field) => spread_names(&field.selection_set, out),
            AstSelection::FragmentSpread(spread) => out.push(&spread.fragment_name),
            AstSelection::InlineFragment(inline) => spread_names(&inline.selection_set, out),
        }
    }
}

fn coerce_variables(
    definitions: &[VariableDefinition<'static, String>],
    provided: Option<&Map<String, Value>>,
) -> Result<Map<String, Value>, QueryError> {
    let mut out = Map::new();
    for def in definitions {
        let invalid = |reason: String| QueryError::InvalidVariable {
            name: def.name.clone(),
            reason,
        };
        match provided.and_then(|vars| vars.get(&def.name)) {
            Some(value) => {
                let coerced = coerce_value(value, &def.var_type).map_err(invalid)?;
                out.insert(def.name.clone(), coerced);
            }
            None => match &def.default_value {
                Some(default) => {
                    let value = to_json(default, &mut |_| {
                        Err(FieldError::UndefinedVariable(def.name.clone()))
                    })
                    .map_err(|_| invalid("default values cannot reference variables".into()))?;
                    out.insert(def.name.clone(), value);
                }
                None if matches!(def.var_type, Type::NonNullType(_)) => {
                    return Err(QueryError::MissingVariable {
                        name: def.name.clone(),
                        ty: type_name(&def.var_type),
                    })
                }
                None => {}
            },
        }
    }
    Ok(out)
}

fn coerce_value(value: &Value, ty: &Type<'static, String>) -> Result<Value, String> {
    match ty {
        Type::NonNullType(inner) => {
            if value.is_null() {
                Err(format!("expected non-null value of type \"{}\"", type_name(ty)))
            } else {
                coerce_value(value, inner)
            }
        }
        Type::ListType(inner) => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| coerce_value(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_value(single, inner)?])),
        },
        Type::NamedType(name) => match (name.as_str(), value) {
            (_, Value::Null) => Ok(Value::Null),
            ("String", Value::String(_)) | ("Boolean", Value::Bool(_)) => Ok(value.clone()),
            ("ID", Value::String(_)) => Ok(value.clone()),
            ("ID", Value::Number(n)) if n.is_i64() => Ok(Value::String(n.to_string())),
            ("Int", Value::Number(n)) if n.is_i64() => Ok(value.clone()),
            ("Float", Value::Number(_)) => Ok(value.clone()),
            (name, other) => Err(format!("expected a value of type \"{name}\", found {other}")),
        },
    }
}

fn type_name(ty: &Type<'static, String>) -> String {
    match ty {
        Type::NamedType(name) => name.clone(),
        Type::ListType(inner) => format!("[{}]", type_name(inner)),
        Type::NonNullType(inner) => format!("{}!", type_name(inner)),
    }
}

fn to_json(
    value: &AstArgumentValue,
    variable: &mut dyn FnMut(&str) -> Result<Value, FieldError>,
) -> Result<Value, FieldError> {
    Ok(match value {
        AstValue::Variable(name) => variable(name)?,
        AstValue::Int(n) => n.as_i64().map(Value::from).unwrap_or(Value::Null),
        AstValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        AstValue::String(s) => Value::String(s.clone()),
        AstValue::Boolean(b) => Value::Bool(*b),
        AstValue::Null => Value::Null,
        AstValue::Enum(e) => Value::String(e.clone()),
        AstValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_json(item, variable)?);
            }
            Value::Array(out)
        }
        AstValue::Object(fields) => {
            let mut out = Map::new();
            for (key, item) in fields {
                out.insert(key.clone(), to_json(item, variable)?);
            }
            Value::Object(out)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("variables must be an object"),
        }
    }

    #[test]
    fn test_single_anonymous_operation() {
        let prepared = PreparedQuery::prepare(&QueryRequest::new("{ page(url: \"x\") { title } }"))
            .unwrap();
        assert!(prepared.operation_name().is_none());
        assert_eq!(prepared.selection_set().items.len(), 1);
    }

    #[test]
    fn test_operation_selection_by_name() {
        let source = "query A { page(url: \"a\") { title } } query B { page(url: \"b\") { tag } }";
        let err = PreparedQuery::prepare(&QueryRequest::new(source)).unwrap_err();
        assert_eq!(err, QueryError::AmbiguousOperation);

        let prepared =
            PreparedQuery::prepare(&QueryRequest::new(source).with_operation_name("B")).unwrap();
        assert_eq!(prepared.operation_name(), Some("B"));

        let err = PreparedQuery::prepare(&QueryRequest::new(source).with_operation_name("C"))
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownOperation("C".into()));
    }

    #[test]
    fn test_fragment_only_document_has_no_operation() {
        let err = PreparedQuery::prepare(&QueryRequest::new("fragment F on Element { tag }"))
            .unwrap_err();
        assert_eq!(err, QueryError::NoOperation);
    }

    #[test]
    fn test_mutations_are_rejected() {
        let err = PreparedQuery::prepare(&QueryRequest::new("mutation { page(url: \"x\") { tag } }"))
            .unwrap_err();
        assert_eq!(err, QueryError::UnsupportedOperation("mutation"));
    }

    #[test]
    fn test_syntax_error() {
        let err = PreparedQuery::prepare(&QueryRequest::new("{ page(url: ")).unwrap_err();
        assert!(matches!(err, QueryError::Parse(_)));
    }

    #[test]
    fn test_variable_coercion_and_defaults() {
        let source = "query Q($url: String!, $sel: String = \"h1\", $flag: Boolean) { page(url: $url) { text(selector: $sel) } }";

        let err = PreparedQuery::prepare(&QueryRequest::new(source)).unwrap_err();
        assert_eq!(
            err,
            QueryError::MissingVariable {
                name: "url".into(),
                ty: "String!".into()
            }
        );

        let prepared = PreparedQuery::prepare(
            &QueryRequest::new(source).with_variables(vars(json!({ "url": "http://a" }))),
        )
        .unwrap();
        assert_eq!(
            prepared.resolve_value(&AstValue::Variable("sel".into())).unwrap(),
            json!("h1")
        );
        assert_eq!(
            prepared.resolve_value(&AstValue::Variable("flag".into())).unwrap(),
            Value::Null
        );
        assert_eq!(
            prepared.resolve_value(&AstValue::Variable("nope".into())).unwrap_err(),
            FieldError::UndefinedVariable("nope".into())
        );

        let err = PreparedQuery::prepare(
            &QueryRequest::new(source).with_variables(vars(json!({ "url": 42 }))),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidVariable { ref name, .. } if name == "url"));
    }

    #[test]
    fn test_skip_and_include() {
        let prepared = PreparedQuery::prepare(
            &QueryRequest::new("query($on: Boolean!) { page(url: \"x\") @include(if: $on) { tag } }")
                .with_variables(vars(json!({ "on": false }))),
        )
        .unwrap();
        let field = match &prepared.selection_set().items[0] {
            graphql_parser::query::Selection::Field(f) => f,
            _ => panic!("expected a field"),
        };
        assert!(!prepared.is_included(&field.directives).unwrap());
    }

    #[test]
    fn test_unknown_directive_is_an_error() {
        let prepared =
            PreparedQuery::prepare(&QueryRequest::new("{ page(url: \"x\") @foo { tag } }")).unwrap();
        let field = match &prepared.selection_set().items[0] {
            graphql_parser::query::Selection::Field(f) => f,
            _ => panic!("expected a field"),
        };
        assert_eq!(
            prepared.is_included(&field.directives).unwrap_err(),
            FieldError::UnknownDirective("foo".into())
        );
    }

    #[test]
    fn test_self_spreading_fragment_is_rejected() {
        let source = "{ page(url: \"x\") { ...A } } fragment A on Node { tag nextAll { ...A } }";
        let err = PreparedQuery::prepare(&QueryRequest::new(source)).unwrap_err();
        assert_eq!(err, QueryError::FragmentCycle("A".into()));
        assert_eq!(err.to_string(), "Cannot spread fragment \"A\" within itself.");
    }

    #[test]
    fn test_indirect_fragment_cycle_is_rejected() {
        let source = "{ page(url: \"x\") { ...A } }
            fragment A on Node { query(selector: \"li\") { ...B } }
            fragment B on Element { ... on Element { next { ...A } } }";
        let err = PreparedQuery::prepare(&QueryRequest::new(source)).unwrap_err();
        assert!(matches!(err, QueryError::FragmentCycle(_)));
    }

    #[test]
    fn test_shared_fragments_without_cycle_are_accepted() {
        let source = "{ page(url: \"x\") { ...A ...B } }
            fragment A on Node { ...C }
            fragment B on Node { ...C }
            fragment C on Node { tag }";
        assert!(PreparedQuery::prepare(&QueryRequest::new(source)).is_ok());
    }
}
