//! One compilation's binding trace and module descriptor.
//!
//! Both are created on first use and dropped with the session. A fresh
//! session per compilation means no analysis result outlives the run that
//! produced it.

use jetc_engine::{BindingContext, BindingTrace, ModuleDescriptor};
use once_cell::unsync::OnceCell;

pub struct CompilationSession<T: BindingTrace + Default> {
    module_name: String,
    trace: OnceCell<T>,
    module: OnceCell<ModuleDescriptor>,
}

impl<T: BindingTrace + Default> CompilationSession<T> {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            trace: OnceCell::new(),
            module: OnceCell::new(),
        }
    }

    /// Whether analysis has touched this session yet.
    pub fn is_initialized(&self) -> bool {
        self.trace.get().is_some()
    }

    fn init(&self) {
        self.trace.get_or_init(T::default);
        self.module.get_or_init(|| ModuleDescriptor::new(self.module_name.clone()));
    }

    /// Trace and module descriptor for writing, created on first call.
    pub fn parts_mut(&mut self) -> (&mut T, &mut ModuleDescriptor) {
        self.init();
        match (self.trace.get_mut(), self.module.get_mut()) {
            (Some(trace), Some(module)) => (trace, module),
            _ => unreachable!("session parts are initialized together"),
        }
    }

    pub fn trace(&self) -> &T {
        self.trace.get_or_init(T::default)
    }

    pub fn binding_context(&self) -> BindingContext<'_> {
        self.trace().binding_context()
    }

    pub fn module(&self) -> &ModuleDescriptor {
        self.module
            .get_or_init(|| ModuleDescriptor::new(self.module_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetc_engine::resolve::slices::FILE_TO_PACKAGE;
    use jetc_engine::{FilteringTrace, FqName, SemanticTrace, SourceId};

    #[test]
    fn test_created_lazily() {
        let mut session: CompilationSession<SemanticTrace> = CompilationSession::new("m");
        assert!(!session.is_initialized());

        let (trace, module) = session.parts_mut();
        trace.record(&FILE_TO_PACKAGE, SourceId(0), FqName::new("p"));
        module.declare_package(&FqName::new("p"));

        assert!(session.is_initialized());
        assert_eq!(session.module().name(), "m");
        assert_eq!(
            session.binding_context().get(&FILE_TO_PACKAGE, &SourceId(0)),
            Some(&FqName::new("p"))
        );
    }

    #[test]
    fn test_sessions_do_not_share_state() {
        let mut first: CompilationSession<FilteringTrace> = CompilationSession::new("m");
        first.parts_mut().0.record(&FILE_TO_PACKAGE, SourceId(0), FqName::new("p"));
        let second: CompilationSession<FilteringTrace> = CompilationSession::new("m");

        assert!(second.binding_context().get(&FILE_TO_PACKAGE, &SourceId(0)).is_none());
    }
}
