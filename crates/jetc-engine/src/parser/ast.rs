//! Syntax tree for parsed source files
//!
//! A [`SourceUnit`] is one parsed file. Every node that analysis needs to key
//! in the binding trace carries a [`NodeId`] that is unique within its file.

use std::path::{Path, PathBuf};

use crate::name::{FqName, Name};
use super::token::Span;

/// Identifies a syntax node within one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Stands for the file itself when a whole file must be keyed.
    pub const FILE: NodeId = NodeId(u32::MAX);
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Declared package (root if there is no package directive)
    pub package: FqName,
    /// Span of the package directive, if any
    pub package_span: Option<Span>,
    pub imports: Vec<ImportDirective>,
    /// Top-level declarations in source order
    pub declarations: Vec<Declaration>,
    /// Body statements of a `.kts` script; `None` for ordinary files
    pub script: Option<Vec<Statement>>,
}

impl SourceUnit {
    pub fn is_script(&self) -> bool {
        self.script.is_some()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Top-level classes, interfaces and objects.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Class(class) => Some(class),
            _ => None,
        })
    }

    /// Top-level functions.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Function(function) => Some(function),
            _ => None,
        })
    }

    /// Top-level properties.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Property(property) => Some(property),
            _ => None,
        })
    }

    /// Find a class declaration (at any nesting depth, class objects included).
    pub fn find_class(&self, id: NodeId) -> Option<&ClassDecl> {
        fn search(decls: &[Declaration], id: NodeId) -> Option<&ClassDecl> {
            for decl in decls {
                if let Declaration::Class(class) = decl {
                    if class.id == id {
                        return Some(class);
                    }
                    if let Some(found) = search(&class.members, id) {
                        return Some(found);
                    }
                    if let Some(object) = &class.class_object {
                        if object.id == id {
                            return Some(object);
                        }
                        if let Some(found) = search(&object.members, id) {
                            return Some(found);
                        }
                    }
                }
            }
            None
        }
        search(&self.declarations, id)
    }

    pub fn in_directory(&self, dir: &Path) -> bool {
        self.path.starts_with(dir)
    }
}

/// `import a.b.C`, `import a.b.*` or `import a.b.C as D`.
#[derive(Debug, Clone)]
pub struct ImportDirective {
    pub id: NodeId,
    pub path: FqName,
    pub all_under: bool,
    pub alias: Option<Name>,
    pub span: Span,
}

impl ImportDirective {
    /// The name this import introduces into file scope (`None` for star imports).
    pub fn imported_name(&self) -> Option<Name> {
        if self.all_under {
            return None;
        }
        Some(self.alias.clone().unwrap_or_else(|| self.path.short_name()))
    }
}

/// Declaration modifiers the frontend keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_abstract: bool,
    pub is_open: bool,
    pub is_override: bool,
    pub is_private: bool,
    pub is_data: bool,
    pub is_inner: bool,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Class(ClassDecl),
    Function(FunctionDecl),
    Property(PropertyDecl),
}

impl Declaration {
    pub fn name(&self) -> &Name {
        match self {
            Declaration::Class(class) => &class.name,
            Declaration::Function(function) => &function.name,
            Declaration::Property(property) => &property.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Object,
    Enum,
    /// `class object` / `companion object`
    ClassObject,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: Name,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    pub type_parameters: Vec<Name>,
    /// Primary constructor parameters
    pub constructor_parameters: Vec<Parameter>,
    pub supertypes: Vec<SupertypeEntry>,
    pub members: Vec<Declaration>,
    pub enum_entries: Vec<Name>,
    pub class_object: Option<Box<ClassDecl>>,
    pub span: Span,
}

impl ClassDecl {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(|decl| match decl {
            Declaration::Function(function) => Some(function),
            _ => None,
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|decl| match decl {
            Declaration::Property(property) => Some(property),
            _ => None,
        })
    }

    pub fn nested_classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.members.iter().filter_map(|decl| match decl {
            Declaration::Class(class) => Some(class),
            _ => None,
        })
    }
}

/// `: Base(args), Iface`
#[derive(Debug, Clone)]
pub struct SupertypeEntry {
    pub type_ref: TypeRef,
    /// Whether the entry is a constructor call (`Base()`)
    pub constructor_call: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub id: NodeId,
    pub name: Name,
    pub modifiers: Modifiers,
    pub type_parameters: Vec<Name>,
    pub receiver: Option<TypeRef>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeRef>,
    pub body: Option<FunctionBody>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: NodeId,
    pub name: Name,
    pub type_ref: TypeRef,
    pub is_vararg: bool,
    /// `val`/`var` on a primary constructor parameter
    pub property: Option<Mutability>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Val,
    Var,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Expr),
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub id: NodeId,
    pub name: Name,
    pub mutability: Mutability,
    pub modifiers: Modifiers,
    pub type_ref: Option<TypeRef>,
    pub initializer: Option<Expr>,
    pub span: Span,
}

/// A (possibly qualified, possibly generic) type reference.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub id: NodeId,
    pub segments: Vec<Name>,
    pub arguments: Vec<TypeRef>,
    pub nullable: bool,
    pub span: Span,
}

impl TypeRef {
    pub fn qualified_name(&self) -> FqName {
        FqName::from_segments(&self.segments)
    }

    pub fn is_simple(&self, name: &str) -> bool {
        self.segments.len() == 1 && self.segments[0].as_str() == name
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Local {
        id: NodeId,
        name: Name,
        mutability: Mutability,
        type_ref: Option<TypeRef>,
        value: Expr,
        span: Span,
    },
    Assign {
        id: NodeId,
        target: Name,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    Return {
        id: NodeId,
        value: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Local { span, .. } | Statement::Assign { span, .. } | Statement::Return { span, .. } => *span,
            Statement::Expr(expr) => expr.span(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Append,
}

#[derive(Debug, Clone)]
pub enum Expr {
    StringLit { id: NodeId, value: String, span: Span },
    IntLit { id: NodeId, value: i64, span: Span },
    BoolLit { id: NodeId, value: bool, span: Span },
    Null { id: NodeId, span: Span },
    Name { id: NodeId, name: Name, span: Span },
    Call {
        id: NodeId,
        callee: Name,
        arguments: Vec<Expr>,
        lambda: Option<Vec<Statement>>,
        span: Span,
    },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::StringLit { id, .. }
            | Expr::IntLit { id, .. }
            | Expr::BoolLit { id, .. }
            | Expr::Null { id, .. }
            | Expr::Name { id, .. }
            | Expr::Call { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::StringLit { span, .. }
            | Expr::IntLit { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::Null { span, .. }
            | Expr::Name { span, .. }
            | Expr::Call { span, .. } => *span,
        }
    }
}
