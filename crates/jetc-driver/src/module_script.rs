//! Module scripts
//!
//! A module script declares the modules of a project with the
//! `kotlin.modules` builder DSL:
//!
//! ```kotlin
//! import kotlin.modules.*
//!
//! fun project() {
//!     module("core") {
//!         sources += "core/src"
//!         classpath += "lib/annotations.jar"
//!         outputDir = "out/core"
//!     }
//! }
//! ```
//!
//! The script is parsed and analyzed like any other source, then `project()`
//! is evaluated by a [`DynamicEntryPoint`] that receives the
//! [`ProjectBuilder`] to fill. Every load works on its own builder.

use std::io;
use std::path::{Path, PathBuf};

use jetc_engine::parser::ast::{AssignOp, Declaration, Expr, FunctionBody, FunctionDecl, PropertyDecl, Statement};
use jetc_engine::resolve::slices::{BuiltinFunction, DslProperty, ReferenceTarget, REFERENCE_TARGET};
use jetc_engine::resolve::{ClassDescriptorKind, Container, FunctionId, PropertyId};
use jetc_engine::{
    BindingContext, DiagnosticCollector, ElementRef, FilteringTrace, Module, ModuleBuilder, ModuleChunk,
    ModuleDescriptor, ProjectBuilder, SourceId, SourceSet,
};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::compiler::KotlinToJvmCompiler;
use crate::config::CompilerConfiguration;
use crate::environment::CompileEnvironment;
use crate::error::ModuleScriptError;

const ENTRY_POINT: &str = "project";
const MAX_CALL_DEPTH: usize = 64;

/// Failures while evaluating `project()`.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{what} cannot be evaluated in a module script")]
    Unsupported { what: String },

    /// Analysis recorded nothing for an expression that needs a target
    #[error("no resolved target for '{name}'")]
    MissingBinding { name: String },

    #[error("'{name}' is read before it has a value")]
    Uninitialized { name: String },

    #[error("expected {expected} but got {actual}")]
    TypeMismatch { expected: &'static str, actual: &'static str },

    #[error("'{property}' used outside of a module block")]
    OutsideModule { property: String },

    #[error("call depth limit reached while calling '{function}'")]
    RecursionLimit { function: String },
}

/// Something that can run a module script's entry point against a builder.
pub trait DynamicEntryPoint {
    fn invoke(&self, project: &mut ProjectBuilder) -> Result<(), EvaluationError>;
}

/// A value produced while evaluating a module script.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Unit,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "Unit",
            Value::Null => "null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::Str(_) => "String",
        }
    }

    fn into_path(self) -> Result<PathBuf, EvaluationError> {
        match self {
            Value::Str(path) => Ok(PathBuf::from(path)),
            other => Err(EvaluationError::TypeMismatch {
                expected: "String",
                actual: other.kind(),
            }),
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Unit => "kotlin.Unit".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Str(value) => value.clone(),
        }
    }
}

enum Flow {
    Next,
    Return(Value),
}

/// Evaluates an analyzed module script directly from its syntax tree and
/// binding trace.
pub struct BuilderDslInterpreter<'a> {
    context: BindingContext<'a>,
    module: &'a ModuleDescriptor,
    sources: &'a SourceSet,
    entry: FunctionId,
}

impl<'a> BuilderDslInterpreter<'a> {
    pub fn new(
        context: BindingContext<'a>,
        module: &'a ModuleDescriptor,
        sources: &'a SourceSet,
        entry: FunctionId,
    ) -> Self {
        Self {
            context,
            module,
            sources,
            entry,
        }
    }

    /// The parameterless top-level `project()` of `source`, if there is one.
    pub fn find_entry_point(module: &ModuleDescriptor, source: SourceId) -> Option<FunctionId> {
        module.functions().find_map(|(id, function)| {
            let top_level = match &function.container {
                Container::Package(_) => true,
                Container::Class(class) => module.class(*class).kind == ClassDescriptorKind::Script,
            };
            (function.source.source == source
                && function.name.as_str() == ENTRY_POINT
                && function.parameters.is_empty()
                && function.type_parameters.is_empty()
                && function.receiver.is_none()
                && top_level)
                .then_some(id)
        })
    }
}

impl DynamicEntryPoint for BuilderDslInterpreter<'_> {
    fn invoke(&self, project: &mut ProjectBuilder) -> Result<(), EvaluationError> {
        let mut evaluation = Evaluation {
            interpreter: self,
            project,
            modules: Vec::new(),
            properties: FxHashMap::default(),
            depth: 0,
        };
        evaluation.call(self.entry, Vec::new())?;
        Ok(())
    }
}

/// State of one `invoke`.
struct Evaluation<'i, 'a> {
    interpreter: &'i BuilderDslInterpreter<'a>,
    project: &'i mut ProjectBuilder,
    /// Open `module { }` blocks, innermost last
    modules: Vec<ModuleBuilder>,
    properties: FxHashMap<PropertyId, Value>,
    depth: usize,
}

type Frame = FxHashMap<ElementRef, Value>;

impl Evaluation<'_, '_> {
    fn target(&self, element: ElementRef, name: &str) -> Result<ReferenceTarget, EvaluationError> {
        self.interpreter
            .context
            .get(&REFERENCE_TARGET, &element)
            .cloned()
            .ok_or_else(|| EvaluationError::MissingBinding { name: name.to_string() })
    }

    fn call(&mut self, id: FunctionId, arguments: Vec<Value>) -> Result<Value, EvaluationError> {
        let descriptor = self.interpreter.module.function(id);
        let name = descriptor.name.to_string();
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvaluationError::RecursionLimit { function: name });
        }
        let source = descriptor.source.source;
        let declaration = find_function(self.interpreter.sources, descriptor.source).ok_or_else(|| {
            EvaluationError::Unsupported {
                what: format!("function '{}'", name),
            }
        })?;
        if declaration.parameters.iter().any(|parameter| parameter.is_vararg) {
            return Err(EvaluationError::Unsupported {
                what: format!("vararg function '{}'", name),
            });
        }

        let mut frame = Frame::default();
        for (parameter, value) in declaration.parameters.iter().zip(arguments) {
            frame.insert(ElementRef::new(source, parameter.id), value);
        }

        debug!(function = %name, depth = self.depth, "evaluating call");
        self.depth += 1;
        let result = match &declaration.body {
            Some(FunctionBody::Block(statements)) => match self.block(source, &mut frame, statements)? {
                Flow::Return(value) => Ok(value),
                Flow::Next => Ok(Value::Unit),
            },
            Some(FunctionBody::Expression(expr)) => self.expr(source, &mut frame, expr),
            None => Err(EvaluationError::Unsupported {
                what: format!("abstract function '{}'", name),
            }),
        };
        self.depth -= 1;
        result
    }

    fn block(&mut self, source: SourceId, frame: &mut Frame, statements: &[Statement]) -> Result<Flow, EvaluationError> {
        for statement in statements {
            if let Flow::Return(value) = self.statement(source, frame, statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn statement(&mut self, source: SourceId, frame: &mut Frame, statement: &Statement) -> Result<Flow, EvaluationError> {
        match statement {
            Statement::Local { id, value, .. } => {
                let value = self.expr(source, frame, value)?;
                frame.insert(ElementRef::new(source, *id), value);
            }
            Statement::Assign {
                id,
                target,
                op,
                value,
                ..
            } => {
                let value = self.expr(source, frame, value)?;
                match self.target(ElementRef::new(source, *id), target.as_str())? {
                    ReferenceTarget::Local(element) | ReferenceTarget::Parameter(element) => {
                        frame.insert(element, value);
                    }
                    ReferenceTarget::Property(property) => {
                        self.properties.insert(property, value);
                    }
                    ReferenceTarget::Dsl(property) => self.assign_dsl(property, *op, value, target.as_str())?,
                    other => {
                        return Err(EvaluationError::Unsupported {
                            what: format!("assignment to {:?}", other),
                        })
                    }
                }
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.expr(source, frame, value)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            Statement::Expr(expr) => {
                self.expr(source, frame, expr)?;
            }
        }
        Ok(Flow::Next)
    }

    fn assign_dsl(&mut self, property: DslProperty, op: AssignOp, value: Value, name: &str) -> Result<(), EvaluationError> {
        let Some(builder) = self.modules.last_mut() else {
            return Err(EvaluationError::OutsideModule {
                property: name.to_string(),
            });
        };
        let path = value.into_path()?;
        match (property, op) {
            (DslProperty::Sources, AssignOp::Append) => builder.add_source(path),
            (DslProperty::Classpath, AssignOp::Append) => builder.add_classpath_entry(path),
            (DslProperty::AnnotationsPath, AssignOp::Append) => builder.add_annotations_path_entry(path),
            (DslProperty::OutputDir, AssignOp::Set) => builder.set_output_dir(path),
            _ => {
                return Err(EvaluationError::Unsupported {
                    what: format!("this assignment to '{}'", name),
                })
            }
        }
        Ok(())
    }

    fn expr(&mut self, source: SourceId, frame: &mut Frame, expr: &Expr) -> Result<Value, EvaluationError> {
        match expr {
            Expr::StringLit { value, .. } => Ok(Value::Str(value.clone())),
            Expr::IntLit { value, .. } => Ok(Value::Int(*value)),
            Expr::BoolLit { value, .. } => Ok(Value::Bool(*value)),
            Expr::Null { .. } => Ok(Value::Null),
            Expr::Name { id, name, .. } => match self.target(ElementRef::new(source, *id), name.as_str())? {
                ReferenceTarget::Local(element) | ReferenceTarget::Parameter(element) => frame
                    .get(&element)
                    .cloned()
                    .ok_or_else(|| EvaluationError::Uninitialized { name: name.to_string() }),
                ReferenceTarget::Property(property) => self.property(property),
                other => Err(EvaluationError::Unsupported {
                    what: format!("reference to {:?}", other),
                }),
            },
            Expr::Call {
                id,
                callee,
                arguments,
                lambda,
                ..
            } => {
                let target = self.target(ElementRef::new(source, *id), callee.as_str())?;
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.expr(source, frame, argument)?);
                }
                match target {
                    ReferenceTarget::Builtin(BuiltinFunction::Println) => {
                        println!("{}", values.first().map(Value::render).unwrap_or_default());
                        Ok(Value::Unit)
                    }
                    ReferenceTarget::Builtin(BuiltinFunction::Print) => {
                        print!("{}", values.first().map(Value::render).unwrap_or_default());
                        Ok(Value::Unit)
                    }
                    ReferenceTarget::Builtin(BuiltinFunction::Module) => {
                        let name = match values.into_iter().next() {
                            Some(Value::Str(name)) => name,
                            other => {
                                return Err(EvaluationError::TypeMismatch {
                                    expected: "String",
                                    actual: other.as_ref().map_or("nothing", Value::kind),
                                })
                            }
                        };
                        self.modules.push(ModuleBuilder::new(name));
                        let body = lambda.as_deref().unwrap_or_default();
                        let flow = self.block(source, frame, body);
                        let builder = self.modules.pop();
                        flow?;
                        if let Some(builder) = builder {
                            debug!(module = builder.name(), "module declared");
                            self.project.add_module(builder);
                        }
                        Ok(Value::Unit)
                    }
                    ReferenceTarget::Function(function) => self.call(function, values),
                    other => Err(EvaluationError::Unsupported {
                        what: format!("call of {:?}", other),
                    }),
                }
            }
        }
    }

    /// Value of a property: the last assignment, else its initializer.
    fn property(&mut self, id: PropertyId) -> Result<Value, EvaluationError> {
        if let Some(value) = self.properties.get(&id) {
            return Ok(value.clone());
        }
        let descriptor = self.interpreter.module.property(id);
        let name = descriptor.name.to_string();
        let declaration = find_property(self.interpreter.sources, descriptor.source)
            .ok_or_else(|| EvaluationError::Unsupported {
                what: format!("property '{}'", name),
            })?;
        let initializer = declaration
            .initializer
            .as_ref()
            .ok_or(EvaluationError::Uninitialized { name })?;
        let value = self.expr(descriptor.source.source, &mut Frame::default(), initializer)?;
        self.properties.insert(id, value.clone());
        Ok(value)
    }
}

fn find_function(sources: &SourceSet, element: ElementRef) -> Option<&FunctionDecl> {
    sources.kotlin(element.source)?.declarations.iter().find_map(|declaration| match declaration {
        Declaration::Function(function) if function.id == element.node => Some(function),
        _ => None,
    })
}

fn find_property(sources: &SourceSet, element: ElementRef) -> Option<&PropertyDecl> {
    sources.kotlin(element.source)?.declarations.iter().find_map(|declaration| match declaration {
        Declaration::Property(property) if property.id == element.node => Some(property),
        _ => None,
    })
}

/// Loads the modules a module script declares.
pub struct ModuleScriptLoader {
    configuration: CompilerConfiguration,
}

impl ModuleScriptLoader {
    /// Scripts are compiled against the JDK and runtime of `parent` only.
    pub fn new(parent: &CompilerConfiguration) -> Self {
        Self {
            configuration: parent.bootstrap().with_module_name("module-script"),
        }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<Module>, ModuleScriptError> {
        let metadata = std::fs::metadata(path).map_err(|source| ModuleScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(ModuleScriptError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a file"),
            });
        }

        let mut collector = DiagnosticCollector::new();
        let environment = CompileEnvironment::create(self.configuration.clone().with_source(path), &mut collector);
        let mut compiler = KotlinToJvmCompiler::<FilteringTrace>::new(&environment);
        if !compiler.analyze(&mut collector) {
            return Err(ModuleScriptError::Analysis {
                path: path.to_path_buf(),
                diagnostics: collector.into_diagnostics().into_iter().filter(|d| d.is_error()).collect(),
            });
        }

        let session = compiler.session();
        let entry = environment
            .sources()
            .kotlin_units()
            .next()
            .and_then(|(source, _)| BuilderDslInterpreter::find_entry_point(session.module(), source))
            .ok_or_else(|| ModuleScriptError::MissingEntryPoint {
                path: path.to_path_buf(),
            })?;

        let interpreter =
            BuilderDslInterpreter::new(session.binding_context(), session.module(), environment.sources(), entry);
        let mut project = ProjectBuilder::new();
        interpreter
            .invoke(&mut project)
            .map_err(|source| ModuleScriptError::Invocation {
                path: path.to_path_buf(),
                source,
            })?;

        let modules = project.into_modules();
        if modules.is_empty() {
            return Err(ModuleScriptError::NoModules {
                path: path.to_path_buf(),
            });
        }
        info!(script = %path.display(), modules = modules.len(), "loaded module script");
        Ok(modules)
    }

    /// Load a script's modules as a chunk rooted at the script's directory.
    pub fn load_chunk(&self, path: &Path) -> Result<ModuleChunk, ModuleScriptError> {
        let modules = self.load(path)?;
        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(ModuleChunk::with_base_dir(modules, jetc_engine::module::canonicalize(&base_dir)))
    }
}
