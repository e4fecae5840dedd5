use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Describes the shape of a time-series type without carrying any runtime
/// value. Builders consult `TypeMeta` to size bundle/list outputs and to
/// validate that an edge connects compatible shapes before a graph is ever
/// instantiated.
///
/// Scalar element types are identified by name (`type_name::<T>()` at the
/// call site) rather than by a generic parameter here, so `TypeMeta` itself
/// stays a plain, non-generic value that can be stored in builder tables,
/// hashed, and compared for equality the way the wiring layer needs to when
/// resolving type variables.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TypeMeta {
    Scalar(ScalarMeta),
    Bundle(BundleMeta),
    Set(Box<TypeMeta>),
    List(ListMeta),
    Reference(Box<TypeMeta>),
    /// An unresolved type variable, named by the wiring layer. `resolve`
    /// replaces every occurrence with a concrete `TypeMeta`.
    TypeVar(String),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScalarMeta {
    pub type_name: String,
}

impl ScalarMeta {
    pub fn of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Ordered so two bundles built from the same schema definition compare
    /// and hash identically regardless of iteration order at the call site.
    pub fields: BTreeMap<String, TypeMeta>,
}

impl BundleMeta {
    pub fn new(fields: impl IntoIterator<Item = (String, TypeMeta)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    pub element: Box<TypeMeta>,
    /// `None` means a dynamically-sized list (TSL without a fixed size);
    /// `Some(n)` means a fixed-size list of `n` homogeneous children.
    pub size: Option<usize>,
}

impl TypeMeta {
    pub fn scalar(type_name: impl Into<String>) -> Self {
        TypeMeta::Scalar(ScalarMeta::of(type_name))
    }

    /// Builds a scalar `TypeMeta` from `T`'s short type name (no module
    /// path), so call sites don't have to spell it out by hand.
    pub fn scalar_of<T>() -> Self {
        TypeMeta::scalar(tynm::type_name::<T>())
    }

    pub fn set_of(element: TypeMeta) -> Self {
        TypeMeta::Set(Box::new(element))
    }

    pub fn reference_to(target: TypeMeta) -> Self {
        TypeMeta::Reference(Box::new(target))
    }

    pub fn list_of(element: TypeMeta, size: Option<usize>) -> Self {
        TypeMeta::List(ListMeta {
            element: Box::new(element),
            size,
        })
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            TypeMeta::TypeVar(_) => false,
            TypeMeta::Scalar(_) => true,
            TypeMeta::Bundle(b) => b.fields.values().all(TypeMeta::is_resolved),
            TypeMeta::Set(e) | TypeMeta::Reference(e) => e.is_resolved(),
            TypeMeta::List(l) => l.element.is_resolved(),
        }
    }

    /// Replace every `TypeVar` occurrence using `resolution`, returning a
    /// fully concrete `TypeMeta` when all variables used are present.
    pub fn resolve(&self, resolution: &BTreeMap<String, TypeMeta>) -> TypeMeta {
        match self {
            TypeMeta::TypeVar(name) => resolution.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeMeta::Scalar(_) => self.clone(),
            TypeMeta::Bundle(b) => TypeMeta::Bundle(BundleMeta::new(
                b.fields.iter().map(|(k, v)| (k.clone(), v.resolve(resolution))),
            )),
            TypeMeta::Set(e) => TypeMeta::Set(Box::new(e.resolve(resolution))),
            TypeMeta::Reference(e) => TypeMeta::Reference(Box::new(e.resolve(resolution))),
            TypeMeta::List(l) => TypeMeta::List(ListMeta {
                element: Box::new(l.element.resolve(resolution)),
                size: l.size,
            }),
        }
    }
}

impl fmt::Display for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeMeta::Scalar(s) => write!(f, "{}", s.type_name),
            TypeMeta::Bundle(b) => {
                write!(f, "{{")?;
                for (i, (k, v)) in b.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            TypeMeta::Set(e) => write!(f, "Set<{e}>"),
            TypeMeta::List(l) => match l.size {
                Some(n) => write!(f, "List<{}; {}>", l.element, n),
                None => write!(f, "List<{}>", l.element),
            },
            TypeMeta::Reference(e) => write!(f, "Ref<{e}>"),
            TypeMeta::TypeVar(name) => write!(f, "${name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_field_insertion_order() {
        let a = TypeMeta::Bundle(BundleMeta::new([
            ("x".to_string(), TypeMeta::scalar("i64")),
            ("y".to_string(), TypeMeta::scalar("i64")),
        ]));
        let b = TypeMeta::Bundle(BundleMeta::new([
            ("y".to_string(), TypeMeta::scalar("i64")),
            ("x".to_string(), TypeMeta::scalar("i64")),
        ]));
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_replaces_type_vars() {
        let unresolved = TypeMeta::set_of(TypeMeta::TypeVar("T".to_string()));
        assert!(!unresolved.is_resolved());
        let mut resolution = BTreeMap::new();
        resolution.insert("T".to_string(), TypeMeta::scalar("u64"));
        let resolved = unresolved.resolve(&resolution);
        assert!(resolved.is_resolved());
        assert_eq!(resolved, TypeMeta::set_of(TypeMeta::scalar("u64")));
    }

    #[test]
    fn scalar_of_uses_short_type_name() {
        assert_eq!(TypeMeta::scalar_of::<i64>(), TypeMeta::scalar("i64"));
    }

    #[test]
    fn display_nested_shapes() {
        let t = TypeMeta::reference_to(TypeMeta::list_of(TypeMeta::scalar("f64"), Some(3)));
        assert_eq!(t.to_string(), "Ref<List<f64; 3>>");
    }
}
