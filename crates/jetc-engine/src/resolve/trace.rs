//! The binding trace shared by analysis, the light-class bridge and codegen
//!
//! `SemanticTrace` keeps one `FxHashMap<K, V>` per slice, type-erased behind
//! `Box<dyn Any>` and keyed by slice name. `FilteringTrace` wraps it and
//! drops writes to resolution-scope slices.

use std::any::Any;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use tracing::{error, trace};

use super::diagnostics::Diagnostic;
use super::slices::{BooleanSlice, Slice, SliceKind};

/// Write access to a trace.
pub trait BindingTrace {
    fn record<K, V>(&mut self, slice: &Slice<K, V>, key: K, value: V)
    where
        K: Eq + Hash + 'static,
        V: 'static;

    fn get<K, V>(&self, slice: &Slice<K, V>, key: &K) -> Option<&V>
    where
        K: Eq + Hash + 'static,
        V: 'static;

    fn record_flag<K>(&mut self, slice: &BooleanSlice<K>, key: K)
    where
        K: Eq + Hash + 'static,
    {
        self.record(slice, key, true);
    }

    fn get_flag<K>(&self, slice: &BooleanSlice<K>, key: &K) -> bool
    where
        K: Eq + Hash + 'static,
    {
        self.get(slice, key).copied().unwrap_or(false)
    }

    fn report(&mut self, diagnostic: Diagnostic);

    /// Read view over everything recorded so far.
    fn binding_context(&self) -> BindingContext<'_>;
}

/// The full trace.
#[derive(Default)]
pub struct SemanticTrace {
    slices: FxHashMap<&'static str, Box<dyn Any>>,
    diagnostics: Vec<Diagnostic>,
}

impl SemanticTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn map<K, V>(&self, slice: &Slice<K, V>) -> Option<&FxHashMap<K, V>>
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        self.slices.get(slice.name)?.downcast_ref::<FxHashMap<K, V>>()
    }
}

impl std::fmt::Debug for SemanticTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut slices: Vec<&&str> = self.slices.keys().collect();
        slices.sort();
        f.debug_struct("SemanticTrace")
            .field("slices", &slices)
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

impl BindingTrace for SemanticTrace {
    fn record<K, V>(&mut self, slice: &Slice<K, V>, key: K, value: V)
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        let storage = self
            .slices
            .entry(slice.name)
            .or_insert_with(|| Box::new(FxHashMap::<K, V>::default()));
        match storage.downcast_mut::<FxHashMap<K, V>>() {
            Some(map) => {
                map.insert(key, value);
            }
            None => error!(slice = slice.name, "slice recorded with mismatched key/value types"),
        }
    }

    fn get<K, V>(&self, slice: &Slice<K, V>, key: &K) -> Option<&V>
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        self.map(slice)?.get(key)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn binding_context(&self) -> BindingContext<'_> {
        BindingContext { trace: self }
    }
}

/// Trace for non-interactive compilation: resolution scopes are not kept.
#[derive(Debug, Default)]
pub struct FilteringTrace {
    inner: SemanticTrace,
    dropped: usize,
}

impl FilteringTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl BindingTrace for FilteringTrace {
    fn record<K, V>(&mut self, slice: &Slice<K, V>, key: K, value: V)
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        if slice.kind == SliceKind::ResolutionScope {
            self.dropped += 1;
            trace!(slice = slice.name, "dropping write");
            return;
        }
        self.inner.record(slice, key, value);
    }

    fn get<K, V>(&self, slice: &Slice<K, V>, key: &K) -> Option<&V>
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        self.inner.get(slice, key)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.inner.report(diagnostic);
    }

    fn binding_context(&self) -> BindingContext<'_> {
        self.inner.binding_context()
    }
}

/// Read-only view of a trace.
#[derive(Clone, Copy)]
pub struct BindingContext<'t> {
    trace: &'t SemanticTrace,
}

impl<'t> BindingContext<'t> {
    pub fn get<K, V>(&self, slice: &Slice<K, V>, key: &K) -> Option<&'t V>
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        self.trace.map(slice)?.get(key)
    }

    pub fn get_flag<K>(&self, slice: &BooleanSlice<K>, key: &K) -> bool
    where
        K: Eq + Hash + 'static,
    {
        self.get(slice, key).copied().unwrap_or(false)
    }

    /// Every entry of a slice, in no particular order.
    pub fn entries<K, V>(&self, slice: &Slice<K, V>) -> Vec<(&'t K, &'t V)>
    where
        K: Eq + Hash + 'static,
        V: 'static,
    {
        self.trace
            .map(slice)
            .map(|map| map.iter().collect())
            .unwrap_or_default()
    }

    pub fn diagnostics(&self) -> &'t [Diagnostic] {
        &self.trace.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.trace.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::FqName;
    use crate::parser::ast::NodeId;
    use crate::resolve::descriptors::{ClassId, ResolvedType};
    use crate::resolve::diagnostics::DiagnosticCode;
    use crate::resolve::scope::{LexicalScope, ScopeKind};
    use crate::resolve::slices::{BODY_RESOLVED, CLASS, RESOLUTION_SCOPE, TYPE};
    use crate::source::{ElementRef, SourceId};

    fn element(node: u32) -> ElementRef {
        ElementRef::new(SourceId(0), NodeId(node))
    }

    #[test]
    fn test_round_trip_on_full_trace() {
        let mut trace = SemanticTrace::new();
        trace.record(&CLASS, FqName::new("a.B"), ClassId(3));
        trace.record(&TYPE, element(1), ResolvedType::int());
        trace.record(&RESOLUTION_SCOPE, element(1), LexicalScope::new(ScopeKind::File, FqName::new("a")));

        assert_eq!(trace.get(&CLASS, &FqName::new("a.B")), Some(&ClassId(3)));
        assert_eq!(trace.get(&TYPE, &element(1)), Some(&ResolvedType::int()));
        assert!(trace.get(&RESOLUTION_SCOPE, &element(1)).is_some());
        assert_eq!(trace.get(&TYPE, &element(2)), None);
    }

    #[test]
    fn test_filtering_trace_drops_only_scopes() {
        let mut trace = FilteringTrace::new();
        trace.record(&RESOLUTION_SCOPE, element(1), LexicalScope::new(ScopeKind::Function, FqName::root()));
        trace.record(&TYPE, element(1), ResolvedType::string());

        assert_eq!(trace.get(&RESOLUTION_SCOPE, &element(1)), None);
        assert_eq!(trace.get(&TYPE, &element(1)), Some(&ResolvedType::string()));
        assert_eq!(trace.dropped(), 1);
    }

    #[test]
    fn test_boolean_slice_misses_as_false() {
        let mut trace = SemanticTrace::new();
        assert!(!trace.get_flag(&BODY_RESOLVED, &element(5)));
        trace.record_flag(&BODY_RESOLVED, element(5));
        assert!(trace.get_flag(&BODY_RESOLVED, &element(5)));
        assert!(trace.binding_context().get_flag(&BODY_RESOLVED, &element(5)));
    }

    #[test]
    fn test_later_record_overwrites() {
        let mut trace = SemanticTrace::new();
        trace.record(&CLASS, FqName::new("X"), ClassId(1));
        trace.record(&CLASS, FqName::new("X"), ClassId(2));
        assert_eq!(trace.binding_context().get(&CLASS, &FqName::new("X")), Some(&ClassId(2)));
        assert_eq!(trace.binding_context().entries(&CLASS).len(), 1);
    }

    #[test]
    fn test_diagnostics_are_visible_through_context() {
        let mut trace = FilteringTrace::new();
        trace.report(Diagnostic::warning(DiagnosticCode::Unsupported, "w"));
        assert!(!trace.binding_context().has_errors());
        trace.report(Diagnostic::error(DiagnosticCode::TypeMismatch, "e"));
        assert!(trace.binding_context().has_errors());
        assert_eq!(trace.binding_context().diagnostics().len(), 2);
    }
}
