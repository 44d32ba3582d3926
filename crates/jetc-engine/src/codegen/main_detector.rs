//! Main-class detection
//!
//! A file provides an entry point if it declares a top-level
//! `fun main(args: Array<String>)` returning `Unit`, or if it is a script.
//! The main class exists only when exactly one of the target files does.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::parser::ast::NodeId;
use crate::resolve::descriptors::{FunctionDescriptor, ModuleDescriptor};
use crate::resolve::slices::{CLASS_DECLARATION, FILE_TO_PACKAGE};
use crate::resolve::trace::BindingContext;
use crate::source::{ElementRef, SourceId, SourceSet};
use super::type_mapper::{binary_name, facade_internal_name};

/// `main(args: Array<String>): Unit` at top level, no type parameters, no receiver.
pub fn is_main_function(function: &FunctionDescriptor) -> bool {
    function.name.as_str() == "main"
        && function.is_top_level()
        && function.type_parameters.is_empty()
        && function.receiver.is_none()
        && function.parameters.len() == 1
        && !function.parameters[0].is_vararg
        && function.parameters[0].ty.is_string_array()
        && function.return_type.is_unit()
}

/// Binary name of the class to run, if `files` have exactly one entry point.
pub fn find_main_class(
    context: BindingContext<'_>,
    module: &ModuleDescriptor,
    sources: &SourceSet,
    files: &[SourceId],
) -> Option<String> {
    let targets: FxHashSet<SourceId> = files.iter().copied().collect();
    let mut candidates: Vec<(SourceId, String)> = Vec::new();

    for &source in files {
        let Some(unit) = sources.kotlin(source) else {
            continue;
        };
        if unit.is_script() {
            if let Some(&class) = context.get(&CLASS_DECLARATION, &ElementRef::new(source, NodeId::FILE)) {
                candidates.push((source, binary_name(&module.class(class).internal_name)));
            }
        }
    }

    let mut with_main: Vec<SourceId> = module
        .functions()
        .filter(|(_, function)| targets.contains(&function.source.source) && is_main_function(function))
        .map(|(_, function)| function.source.source)
        .collect();
    with_main.sort();
    with_main.dedup();
    for source in with_main {
        let package = context.get(&FILE_TO_PACKAGE, &source).cloned().unwrap_or_default();
        candidates.push((source, binary_name(&facade_internal_name(&package))));
    }

    match candidates.as_slice() {
        [(_, class)] => Some(class.clone()),
        [] => {
            debug!("no main function found");
            None
        }
        _ => {
            debug!(candidates = candidates.len(), "several main functions, no main class");
            None
        }
    }
}
