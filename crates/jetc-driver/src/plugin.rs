//! Compiler plugins
//!
//! A plugin runs after analysis with read access to the binding context and
//! the module descriptor. It cannot change either; it can only report
//! diagnostics, and an error from a plugin stops the compilation like an
//! analysis error does.

use jetc_engine::{BindingContext, Diagnostic, ModuleDescriptor, SourceSet};

/// What a plugin sees of one analyzed compilation.
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
    pub binding_context: BindingContext<'a>,
    pub module: &'a ModuleDescriptor,
    pub sources: &'a SourceSet,
}

pub trait CompilerPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect the analysis results. Returned diagnostics are forwarded to
    /// the message collector.
    fn process(&self, context: PluginContext<'_>) -> Vec<Diagnostic>;
}

impl std::fmt::Debug for dyn CompilerPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerPlugin").field("name", &self.name()).finish()
    }
}
