//! Builtin types, functions and packages

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::name::{FqName, Name};
use super::descriptors::{BuiltinType, ResolvedType, ValueParameter};
use super::slices::BuiltinFunction;

/// Packages that exist without any source or classpath entry.
pub const BUILTIN_PACKAGES: &[&str] = &["kotlin", "kotlin.io", "kotlin.jvm", "kotlin.modules"];

/// Builtin types by simple and qualified name.
static BUILTIN_TYPES: Lazy<FxHashMap<FqName, BuiltinType>> = Lazy::new(|| {
    let all = [
        BuiltinType::Unit,
        BuiltinType::Nothing,
        BuiltinType::Any,
        BuiltinType::Boolean,
        BuiltinType::Byte,
        BuiltinType::Short,
        BuiltinType::Char,
        BuiltinType::Int,
        BuiltinType::Long,
        BuiltinType::Float,
        BuiltinType::Double,
        BuiltinType::String,
        BuiltinType::Array,
    ];
    let mut map = FxHashMap::default();
    for builtin in all {
        map.insert(FqName::new("kotlin").child(&Name::identifier(builtin.name())), builtin);
    }
    map
});

/// A builtin function signature.
#[derive(Debug, Clone)]
pub struct BuiltinSignature {
    pub function: BuiltinFunction,
    pub fq_name: FqName,
    pub parameters: Vec<ValueParameter>,
    pub return_type: ResolvedType,
    /// Whether the call takes a trailing lambda
    pub takes_lambda: bool,
}

static BUILTIN_FUNCTIONS: Lazy<Vec<BuiltinSignature>> = Lazy::new(|| {
    let any = || ValueParameter {
        name: Name::identifier("message"),
        ty: ResolvedType::nullable_any(),
        is_vararg: false,
        source: None,
    };
    vec![
        BuiltinSignature {
            function: BuiltinFunction::Println,
            fq_name: FqName::new("kotlin.io.println"),
            parameters: vec![any()],
            return_type: ResolvedType::unit(),
            takes_lambda: false,
        },
        BuiltinSignature {
            function: BuiltinFunction::Println,
            fq_name: FqName::new("kotlin.io.println"),
            parameters: Vec::new(),
            return_type: ResolvedType::unit(),
            takes_lambda: false,
        },
        BuiltinSignature {
            function: BuiltinFunction::Print,
            fq_name: FqName::new("kotlin.io.print"),
            parameters: vec![any()],
            return_type: ResolvedType::unit(),
            takes_lambda: false,
        },
        BuiltinSignature {
            function: BuiltinFunction::Module,
            fq_name: FqName::new("kotlin.modules.module"),
            parameters: vec![ValueParameter {
                name: Name::identifier("name"),
                ty: ResolvedType::string(),
                is_vararg: false,
                source: None,
            }],
            return_type: ResolvedType::unit(),
            takes_lambda: true,
        },
    ]
});

/// The builtin type named `fq_name` (`kotlin.Int`).
pub fn builtin_type(fq_name: &FqName) -> Option<BuiltinType> {
    BUILTIN_TYPES.get(fq_name).copied()
}

/// Builtin overloads named `fq_name`.
pub fn builtin_functions(fq_name: &FqName) -> Vec<&'static BuiltinSignature> {
    BUILTIN_FUNCTIONS.iter().filter(|s| &s.fq_name == fq_name).collect()
}

pub fn is_builtin_package(package: &FqName) -> bool {
    BUILTIN_PACKAGES.iter().any(|p| package.as_str() == *p)
}

/// Whether `fq_name` names a builtin type or function.
pub fn is_builtin_declaration(fq_name: &FqName) -> bool {
    builtin_type(fq_name).is_some() || !builtin_functions(fq_name).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_type(&FqName::new("kotlin.Int")), Some(BuiltinType::Int));
        assert_eq!(builtin_type(&FqName::new("Int")), None);
        assert_eq!(builtin_functions(&FqName::new("kotlin.io.println")).len(), 2);
        assert!(is_builtin_package(&FqName::new("kotlin.modules")));
        assert!(is_builtin_declaration(&FqName::new("kotlin.modules.module")));
    }
}
