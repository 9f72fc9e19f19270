//! Member descriptions exposed by inspectable targets

use crate::error::MemberKind;
use crate::types::ComponentRef;
use std::any::{type_name, Any, TypeId};

/// Untyped value crossing the accessor boundary
pub type DynValue = Box<dyn Any + Send>;

/// Member visibility, and the visibility filter used when resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    NonPublic,
    /// Filter only: accept either
    Any,
}

impl Visibility {
    /// Whether a member declared with `declared` passes this filter
    #[inline]
    #[must_use]
    pub fn admits(self, declared: Visibility) -> bool {
        match self {
            Visibility::Any => true,
            requested => requested == declared,
        }
    }
}

/// Declared shape of one member
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
    /// Value type for fields/properties, return type for methods
    pub value_type: TypeId,
    pub type_name: &'static str,
    /// Parameter count; zero for fields and properties
    pub arity: usize,
    pub writable: bool,
}

impl MemberInfo {
    fn new<T: Any>(name: impl Into<String>, kind: MemberKind, arity: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            value_type: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            arity,
            writable: false,
        }
    }

    /// Describe a field holding a `T`
    #[must_use]
    pub fn field<T: Any>(name: impl Into<String>) -> Self {
        Self::new::<T>(name, MemberKind::Field, 0)
    }

    /// Describe a property yielding a `T`
    #[must_use]
    pub fn property<T: Any>(name: impl Into<String>) -> Self {
        Self::new::<T>(name, MemberKind::Property, 0)
    }

    /// Describe a method overload returning `R`
    #[must_use]
    pub fn method<R: Any>(name: impl Into<String>, arity: usize) -> Self {
        Self::new::<R>(name, MemberKind::Method, arity)
    }

    #[must_use]
    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    #[must_use]
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// An object whose layout is only known at runtime
///
/// Implemented by the host for each foreign object it lets adapters read.
/// Every call reflects live state; nothing is cached by the accessor layer.
pub trait Inspectable: Send + Sync {
    /// Component this object belongs to, for diagnostics
    fn scope(&self) -> ComponentRef;

    /// Declared members
    fn members(&self) -> Vec<MemberInfo>;

    /// Current value of a field or property
    fn read(&self, member: &str) -> Option<DynValue>;

    /// Overwrite a field or property
    fn write(&self, member: &str, _value: DynValue) -> Result<(), String> {
        Err(format!("`{member}` cannot be written"))
    }

    /// Call a method overload selected by argument count
    fn invoke(&self, member: &str, _args: Vec<DynValue>) -> Result<DynValue, String> {
        Err(format!("`{member}` cannot be invoked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_admits_everything() {
        assert!(Visibility::Any.admits(Visibility::Public));
        assert!(Visibility::Any.admits(Visibility::NonPublic));
        assert!(!Visibility::Public.admits(Visibility::NonPublic));
    }

    #[test]
    fn member_builders() {
        let m = MemberInfo::field::<u32>("count").non_public().writable();
        assert_eq!(m.kind, MemberKind::Field);
        assert_eq!(m.visibility, Visibility::NonPublic);
        assert!(m.writable);
        assert_eq!(m.value_type, TypeId::of::<u32>());
    }
}
