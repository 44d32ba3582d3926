use std::sync::Arc;

use jetc_engine::light_classes::{LightClassBridge, SearchScope};
use jetc_engine::resolve::slices::JAVA_CLASS;
use jetc_engine::{
    analyze, parse_source, scan_java_source, BindingTrace, ClasspathIndex, FilteringTrace, FqName, ModuleDescriptor,
    PackageIndex, SourceFile, SourceSet,
};

// ============================================================================
// Helpers
// ============================================================================

fn kotlin(sources: &mut SourceSet, path: &str, text: &str) {
    let unit = parse_source(text, path).expect("source should parse");
    sources.add(SourceFile::Kotlin(Arc::new(unit)));
}

fn java(sources: &mut SourceSet, path: &str, text: &str) {
    let file = scan_java_source(text, path).expect("java header should scan");
    sources.add(SourceFile::Java(Arc::new(file)));
}

fn analyzed(sources: &SourceSet) -> (FilteringTrace, ModuleDescriptor) {
    let mut trace = FilteringTrace::new();
    let mut module = ModuleDescriptor::new("test");
    analyze(sources, &ClasspathIndex::new(), &PackageIndex::for_sources(sources), &mut trace, &mut module);
    (trace, module)
}

fn sample() -> SourceSet {
    let mut sources = SourceSet::new();
    kotlin(
        &mut sources,
        "/src/a/b/shapes.kt",
        "package a.b\n\nopen class Shape\n\nclass Circle : Shape() {\n    class object {\n        fun unit(): Circle = Circle()\n    }\n}\n",
    );
    kotlin(&mut sources, "/src/a/c/util.kt", "package a.c\n\nobject Registry\n\nfun helper() {}\n");
    sources
}

// ============================================================================
// Class Lookups
// ============================================================================

#[test]
fn test_finds_top_level_class() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    let found = bridge.find_class_or_object_declarations(&FqName::new("a.b.Circle"), &SearchScope::Everything);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].fq_name, FqName::new("a.b.Circle"));
    let declaration = found[0].declaration(&sources).expect("declaration node");
    assert_eq!(declaration.name.as_str(), "Circle");
}

#[test]
fn test_finds_object() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    let found = bridge.find_class_or_object_declarations(&FqName::new("a.c.Registry"), &SearchScope::Everything);
    assert_eq!(found.len(), 1);
}

#[test]
fn test_class_object_resolves_through_outer_class() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    let found = bridge.find_class_or_object_declarations(&FqName::new("a.b.Circle.object"), &SearchScope::Everything);
    assert_eq!(found.len(), 1);
    assert_eq!(module.class(found[0].class_id).internal_name, "a/b/Circle$object");

    let missing = bridge.find_class_or_object_declarations(&FqName::new("a.b.Shape.object"), &SearchScope::Everything);
    assert!(missing.is_empty());
}

#[test]
fn test_unknown_class_is_empty() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    assert!(bridge
        .find_class_or_object_declarations(&FqName::new("a.b.Square"), &SearchScope::Everything)
        .is_empty());
}

#[test]
fn test_scope_filters_declarations() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    let only_util = SearchScope::files(["/src/a/c/util.kt"]);
    assert!(bridge
        .find_class_or_object_declarations(&FqName::new("a.b.Circle"), &only_util)
        .is_empty());
    assert_eq!(
        bridge
            .find_class_or_object_declarations(&FqName::new("a.c.Registry"), &only_util)
            .len(),
        1
    );

    let directory = SearchScope::Directories(vec!["/src/a/b".into()]);
    assert_eq!(
        bridge
            .find_class_or_object_declarations(&FqName::new("a.b.Shape"), &directory)
            .len(),
        1
    );
}

// ============================================================================
// Packages
// ============================================================================

#[test]
fn test_files_for_package() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    let files = bridge.find_files_for_package(&FqName::new("a.b"), &SearchScope::Everything);
    assert_eq!(files.len(), 1);
    assert!(bridge
        .find_files_for_package(&FqName::new("a.b"), &SearchScope::files(["/elsewhere.kt"]))
        .is_empty());
}

#[test]
fn test_declarations_in_package_are_top_level_only() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    let mut names: Vec<String> = bridge
        .find_class_or_object_declarations_in_package(&FqName::new("a.b"), &SearchScope::Everything)
        .into_iter()
        .map(|declaration| declaration.fq_name.to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.b.Circle", "a.b.Shape"]);
}

#[test]
fn test_package_views_and_sub_packages() {
    let sources = sample();
    let (trace, module) = analyzed(&sources);
    let bridge = LightClassBridge::new(trace.binding_context(), &module, &sources);

    assert!(bridge.package_exists(&FqName::new("a"), &SearchScope::Everything));
    assert!(bridge.package_exists(&FqName::new("a.c"), &SearchScope::Everything));
    assert!(!bridge.package_exists(&FqName::new("a.d"), &SearchScope::Everything));

    let mut sub: Vec<String> = bridge
        .get_sub_packages(&FqName::new("a"), &SearchScope::Everything)
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    sub.sort();
    assert_eq!(sub, vec!["b", "c"]);
    assert!(bridge
        .get_sub_packages(&FqName::new("a.b"), &SearchScope::Everything)
        .is_empty());
}

// ============================================================================
// Java Sources
// ============================================================================

#[test]
fn test_java_class_extends_kotlin_class() {
    let mut sources = sample();
    java(
        &mut sources,
        "/src/j/Square.java",
        "package j;\n\nimport a.b.Shape;\n\npublic class Square extends Shape {\n}\n",
    );
    let (trace, _module) = analyzed(&sources);

    let context = trace.binding_context();
    assert!(!context.has_errors(), "{:?}", context.diagnostics());
    let entry = context
        .get(&JAVA_CLASS, &FqName::new("j.Square"))
        .expect("java class recorded");
    assert_eq!(entry.supertypes.len(), 1);
    assert_eq!(entry.internal_name(), "j/Square");
}
