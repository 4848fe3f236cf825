//! Schema registry: the fixed set of queryable shapes and their fields.
//!
//! `Schema::build()` is called once at start-up and the result is shared
//! read-only (usually behind an `Arc`) with every request.

/// Queryable shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Query,
    Node,
    Document,
    Element,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Query => "Query",
            ShapeKind::Node => "Node",
            ShapeKind::Document => "Document",
            ShapeKind::Element => "Element",
        }
    }
}

/// Operation a field invokes on the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    InnerMarkup,
    OuterMarkup,
    Text,
    TagName,
    Attribute,
    Descendants,
    NextSibling,
    NextSiblings,
    Title,
    Page,
}

/// Declared result shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Scalar,
    Node(ShapeKind),
    NodeList(ShapeKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    NonNullString,
}

impl ArgType {
    pub fn is_required(&self) -> bool {
        matches!(self, ArgType::NonNullString)
    }

    fn sdl(&self) -> &'static str {
        match self {
            ArgType::String => "String",
            ArgType::NonNullString => "String!",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgDef {
    pub name: &'static str,
    pub description: &'static str,
    pub ty: ArgType,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgDef>,
    pub shape: ReturnShape,
    pub capability: Capability,
}

impl FieldDef {
    pub fn arg(&self, name: &str) -> Option<&ArgDef> {
        self.args.iter().find(|a| a.name == name)
    }

    fn sdl_type(&self) -> String {
        match self.shape {
            ReturnShape::Scalar => "String".to_string(),
            ReturnShape::Node(kind) => kind.name().to_string(),
            ReturnShape::NodeList(kind) => format!("[{}]", kind.name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub kind: ShapeKind,
    pub description: &'static str,
    pub is_interface: bool,
    pub interfaces: Vec<ShapeKind>,
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a fragment with type condition `condition` applies to values
    /// of this type.
    pub fn matches_condition(&self, condition: &str) -> bool {
        condition == self.name() || self.interfaces.iter().any(|i| i.name() == condition)
    }
}

/// Argument name used for selection narrowing.
pub const SELECTOR_ARG: &str = "selector";

fn arg(name: &'static str, description: &'static str, ty: ArgType) -> ArgDef {
    ArgDef {
        name,
        description,
        ty,
    }
}

fn selector_arg() -> ArgDef {
    arg(
        SELECTOR_ARG,
        "CSS selector narrowing the current node to its matching descendants first.",
        ArgType::String,
    )
}

fn field(
    name: &'static str,
    description: &'static str,
    args: Vec<ArgDef>,
    shape: ReturnShape,
    capability: Capability,
) -> FieldDef {
    FieldDef {
        name,
        description,
        args,
        shape,
        capability,
    }
}

/// Fields shared by every node-shaped type through the `Node` interface.
fn node_fields() -> Vec<FieldDef> {
    use Capability::*;
    use ReturnShape::{Node, NodeList, Scalar};

    vec![
        field(
            "content",
            "Markup of the contents of the first node.",
            vec![selector_arg()],
            Scalar,
            InnerMarkup,
        ),
        field(
            "html",
            "Markup of the first node itself.",
            vec![selector_arg()],
            Scalar,
            OuterMarkup,
        ),
        field(
            "text",
            "Text content of the first node.",
            vec![selector_arg()],
            Scalar,
            Text,
        ),
        field(
            "tag",
            "Tag name of the first node.",
            vec![selector_arg()],
            Scalar,
            TagName,
        ),
        field(
            "attr",
            "Value of an attribute on the first node, or null when absent.",
            vec![
                selector_arg(),
                arg("name", "Attribute name.", ArgType::NonNullString),
            ],
            Scalar,
            Attribute,
        ),
        field(
            "query",
            "Every descendant matching the selector, in document order.",
            vec![arg(
                SELECTOR_ARG,
                "CSS selector matched against descendants.",
                ArgType::NonNullString,
            )],
            NodeList(ShapeKind::Element),
            Descendants,
        ),
        field(
            "next",
            "The element immediately following the node.",
            vec![selector_arg()],
            Node(ShapeKind::Element),
            NextSibling,
        ),
        field(
            "nextAll",
            "Every element following the node.",
            vec![selector_arg()],
            NodeList(ShapeKind::Element),
            NextSiblings,
        ),
    ]
}

/// The immutable registry of every queryable shape.
#[derive(Debug, Clone)]
pub struct Schema {
    query: TypeDef,
    node: TypeDef,
    document: TypeDef,
    element: TypeDef,
}

impl Schema {
    pub fn build() -> Self {
        let query = TypeDef {
            kind: ShapeKind::Query,
            description: "Entry point: fetch a page and walk its document tree.",
            is_interface: false,
            interfaces: vec![],
            fields: vec![field(
                "page",
                "Fetch and parse the document at `url`.",
                vec![arg("url", "Address of the page.", ArgType::NonNullString)],
                ReturnShape::Node(ShapeKind::Document),
                Capability::Page,
            )],
        };

        let node = TypeDef {
            kind: ShapeKind::Node,
            description: "Any addressable point in a document tree.",
            is_interface: true,
            interfaces: vec![],
            fields: node_fields(),
        };

        let mut document_fields = node_fields();
        document_fields.push(field(
            "title",
            "Text of the document's title element.",
            vec![],
            ReturnShape::Scalar,
            Capability::Title,
        ));
        let document = TypeDef {
            kind: ShapeKind::Document,
            description: "The root of a fetched page.",
            is_interface: false,
            interfaces: vec![ShapeKind::Node],
            fields: document_fields,
        };

        let element = TypeDef {
            kind: ShapeKind::Element,
            description: "An element reached by navigating the document.",
            is_interface: false,
            interfaces: vec![ShapeKind::Node],
            fields: node_fields(),
        };

        Self {
            query,
            node,
            document,
            element,
        }
    }

    pub fn type_def(&self, kind: ShapeKind) -> &TypeDef {
        match kind {
            ShapeKind::Query => &self.query,
            ShapeKind::Node => &self.node,
            ShapeKind::Document => &self.document,
            ShapeKind::Element => &self.element,
        }
    }

    pub fn types(&self) -> [&TypeDef; 4] {
        [&self.node, &self.document, &self.element, &self.query]
    }

    pub fn query_type(&self) -> &TypeDef {
        &self.query
    }

    /// Resolve a type condition such as `on Element`.
    pub fn type_by_name(&self, name: &str) -> Option<&TypeDef> {
        self.types().into_iter().find(|ty| ty.name() == name)
    }

    /// Render the registry as GraphQL SDL.
    pub fn sdl(&self) -> String {
        let mut out = String::new();
        for ty in self.types() {
            out.push_str(&format!("\"\"\"{}\"\"\"\n", ty.description));
            let keyword = if ty.is_interface { "interface" } else { "type" };
            out.push_str(&format!("{keyword} {}", ty.name()));
            if !ty.interfaces.is_empty() {
                let names: Vec<&str> = ty.interfaces.iter().map(|i| i.name()).collect();
                out.push_str(&format!(" implements {}", names.join(" & ")));
            }
            out.push_str(" {\n");
            for f in &ty.fields {
                out.push_str(&format!("  \"{}\"\n  {}", f.description, f.name));
                if !f.args.is_empty() {
                    let args: Vec<String> = f
                        .args
                        .iter()
                        .map(|a| format!("{}: {}", a.name, a.ty.sdl()))
                        .collect();
                    out.push_str(&format!("({})", args.join(", ")));
                }
                out.push_str(&format!(": {}\n", f.sdl_type()));
            }
            out.push_str("}\n\n");
        }
        out.push_str("schema {\n  query: Query\n}\n");
        out
    }
}
