//! Validated accessors over opaque foreign objects
//!
//! Fact adapters make assumptions about the layout of components they do
//! not own. An accessor handle captures one such assumption (member name,
//! kind, visibility, and value type), checks it once at construction, and
//! re-reads live state on every access. A wrong assumption becomes an
//! [`AccessError`] scoped to the component, never a crash.
//!
//! # Example
//!
//! ```rust,ignore
//! let wires = get_array::<u8>(&target, "wire_colors", Visibility::NonPublic)?;
//! let cut = get_field::<usize>(&target, "cut_index", Visibility::NonPublic)?
//!     .get_in(0..wires.len()?)?;
//! ```

mod member;

pub use member::{DynValue, Inspectable, MemberInfo, Visibility};

use crate::error::{AccessError, MemberKind};
use crate::types::ComponentRef;
use std::any::{type_name, Any, TypeId};
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::ops::RangeBounds;
use std::sync::Arc;

/// Resolve a field of type `T`
pub fn get_field<T: Any + Send>(
    target: &Arc<dyn Inspectable>,
    name: &str,
    visibility: Visibility,
) -> Result<ValueHandle<T>, AccessError> {
    ValueHandle::resolve(target, name, MemberKind::Field, visibility)
}

/// Resolve a property of type `T`
pub fn get_property<T: Any + Send>(
    target: &Arc<dyn Inspectable>,
    name: &str,
    visibility: Visibility,
) -> Result<ValueHandle<T>, AccessError> {
    ValueHandle::resolve(target, name, MemberKind::Property, visibility)
}

/// Resolve an array-valued field whose elements are `T`
pub fn get_array<T: Any + Send>(
    target: &Arc<dyn Inspectable>,
    name: &str,
    visibility: Visibility,
) -> Result<ArrayHandle<T>, AccessError> {
    let inner = ValueHandle::<Vec<T>>::resolve(target, name, MemberKind::Field, visibility)?;
    Ok(ArrayHandle { inner })
}

/// Resolve a method, optionally pinning the overload by arity
///
/// Without an arity the name must identify exactly one overload.
pub fn get_method(
    target: &Arc<dyn Inspectable>,
    name: &str,
    visibility: Visibility,
    arity: Option<usize>,
) -> Result<MethodHandle, AccessError> {
    let scope = target.scope();
    let named = named_members(target.as_ref(), &scope, name)?;

    let methods: Vec<&MemberInfo> = named
        .iter()
        .filter(|m| m.kind == MemberKind::Method)
        .collect();
    if methods.is_empty() {
        return Err(AccessError::KindMismatch {
            component: scope,
            member: name.to_string(),
            expected: MemberKind::Method,
            found: named[0].kind,
        });
    }

    let visible: Vec<&MemberInfo> = methods
        .into_iter()
        .filter(|m| visibility.admits(m.visibility))
        .collect();
    if visible.is_empty() {
        return Err(AccessError::VisibilityMismatch {
            component: scope,
            member: name.to_string(),
        });
    }

    let candidates: Vec<&MemberInfo> = match arity {
        Some(n) => visible.into_iter().filter(|m| m.arity == n).collect(),
        None => visible,
    };
    match candidates.as_slice() {
        [single] => Ok(MethodHandle {
            target: Arc::clone(target),
            scope,
            member: name.to_string(),
            arity: single.arity,
            returns: single.value_type,
            returns_name: single.type_name,
        }),
        [] => Err(AccessError::NoMatchingOverload {
            component: scope,
            member: name.to_string(),
            arity: arity.unwrap_or_default(),
        }),
        many => Err(AccessError::AmbiguousOverload {
            component: scope,
            member: name.to_string(),
            candidates: many.len(),
        }),
    }
}

fn named_members(
    target: &dyn Inspectable,
    scope: &ComponentRef,
    name: &str,
) -> Result<Vec<MemberInfo>, AccessError> {
    let named: Vec<MemberInfo> = target
        .members()
        .into_iter()
        .filter(|m| m.name == name)
        .collect();
    if named.is_empty() {
        return Err(AccessError::MissingMember {
            component: scope.clone(),
            member: name.to_string(),
        });
    }
    Ok(named)
}

/// Handle to a single-valued field or property
pub struct ValueHandle<T> {
    target: Arc<dyn Inspectable>,
    scope: ComponentRef,
    member: String,
    kind: MemberKind,
    writable: bool,
    _value: PhantomData<fn() -> T>,
}

impl<T> Debug for ValueHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHandle")
            .field("scope", &self.scope)
            .field("member", &self.member)
            .field("kind", &self.kind)
            .field("type", &type_name::<T>())
            .finish()
    }
}

impl<T: Any + Send> ValueHandle<T> {
    fn resolve(
        target: &Arc<dyn Inspectable>,
        name: &str,
        kind: MemberKind,
        visibility: Visibility,
    ) -> Result<Self, AccessError> {
        let scope = target.scope();
        let named = named_members(target.as_ref(), &scope, name)?;

        let of_kind: Vec<&MemberInfo> = named.iter().filter(|m| m.kind == kind).collect();
        if of_kind.is_empty() {
            return Err(AccessError::KindMismatch {
                component: scope,
                member: name.to_string(),
                expected: kind,
                found: named[0].kind,
            });
        }
        let info = match of_kind
            .into_iter()
            .filter(|m| visibility.admits(m.visibility))
            .collect::<Vec<_>>()
            .as_slice()
        {
            [single] => *single,
            [] => {
                return Err(AccessError::VisibilityMismatch {
                    component: scope,
                    member: name.to_string(),
                })
            }
            many => {
                return Err(AccessError::AmbiguousOverload {
                    component: scope,
                    member: name.to_string(),
                    candidates: many.len(),
                })
            }
        };
        if info.value_type != TypeId::of::<T>() {
            return Err(AccessError::TypeMismatch {
                component: scope,
                member: name.to_string(),
                expected: type_name::<T>(),
                found: info.type_name,
            });
        }

        Ok(Self {
            target: Arc::clone(target),
            scope,
            member: name.to_string(),
            kind,
            writable: info.writable,
            _value: PhantomData,
        })
    }

    /// Member name this handle reads
    #[inline]
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Read the live value
    pub fn get(&self) -> Result<T, AccessError> {
        let raw = self
            .target
            .read(&self.member)
            .ok_or_else(|| AccessError::Unreadable {
                component: self.scope.clone(),
                member: self.member.clone(),
                reason: "target returned no value".to_string(),
            })?;
        raw.downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| AccessError::Unreadable {
                component: self.scope.clone(),
                member: self.member.clone(),
                reason: format!("live value is not a {}", type_name::<T>()),
            })
    }

    /// Write directly to the target
    pub fn set(&self, value: T) -> Result<(), AccessError> {
        if !self.writable {
            return Err(AccessError::ReadOnly {
                component: self.scope.clone(),
                member: self.member.clone(),
            });
        }
        self.target
            .write(&self.member, Box::new(value))
            .map_err(|reason| AccessError::WriteFailed {
                component: self.scope.clone(),
                member: self.member.clone(),
                reason,
            })
    }
}

impl<T: Any + Send + Debug> ValueHandle<T> {
    /// Read the live value and reject it unless `valid` holds
    ///
    /// `expected` describes the accepted domain for the diagnostic.
    pub fn get_checked<F>(&self, expected: &str, valid: F) -> Result<T, AccessError>
    where
        F: FnOnce(&T) -> bool,
    {
        let value = self.get()?;
        if valid(&value) {
            Ok(value)
        } else {
            Err(out_of_domain(&self.scope, &self.member, expected, &value))
        }
    }

    /// Read the live value and require it to fall inside `range`
    pub fn get_in<R>(&self, range: R) -> Result<T, AccessError>
    where
        T: PartialOrd,
        R: RangeBounds<T> + Debug,
    {
        let expected = format!("{range:?}");
        self.get_checked(&expected, |v| range.contains(v))
    }
}

/// Handle to an array-valued field
pub struct ArrayHandle<T> {
    inner: ValueHandle<Vec<T>>,
}

impl<T> Debug for ArrayHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayHandle").field(&self.inner).finish()
    }
}

impl<T: Any + Send> ArrayHandle<T> {
    /// Read the whole array
    pub fn get(&self) -> Result<Vec<T>, AccessError> {
        self.inner.get()
    }

    /// Live length
    pub fn len(&self) -> Result<usize, AccessError> {
        Ok(self.inner.get()?.len())
    }

    /// Whether the live array is empty
    pub fn is_empty(&self) -> Result<bool, AccessError> {
        Ok(self.len()? == 0)
    }

    /// Replace the whole array on the target
    pub fn set(&self, values: Vec<T>) -> Result<(), AccessError> {
        self.inner.set(values)
    }
}

impl<T: Any + Send + Debug> ArrayHandle<T> {
    /// Read the element at `index`, rejecting out-of-range indices
    pub fn get_at(&self, index: usize) -> Result<T, AccessError> {
        let mut values = self.inner.get()?;
        if index >= values.len() {
            return Err(AccessError::OutOfDomain {
                component: self.inner.scope.clone(),
                member: self.inner.member.clone(),
                expected: format!("index < {}", values.len()),
                observed: index.to_string(),
            });
        }
        Ok(values.swap_remove(index))
    }

    /// Read the array, requiring an exact length
    pub fn get_exact(&self, len: usize) -> Result<Vec<T>, AccessError> {
        let expected = format!("{len} element(s)");
        self.inner.get_checked(&expected, |v| v.len() == len)
    }

    /// Read the array, requiring every element to satisfy `valid`
    pub fn get_each_checked<F>(&self, expected: &str, valid: F) -> Result<Vec<T>, AccessError>
    where
        F: Fn(&T) -> bool,
    {
        let values = self.inner.get()?;
        if let Some(bad) = values.iter().find(|v| !valid(v)) {
            return Err(out_of_domain(
                &self.inner.scope,
                &self.inner.member,
                expected,
                bad,
            ));
        }
        Ok(values)
    }
}

/// Handle to one method overload
pub struct MethodHandle {
    target: Arc<dyn Inspectable>,
    scope: ComponentRef,
    member: String,
    arity: usize,
    returns: TypeId,
    returns_name: &'static str,
}

impl Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("scope", &self.scope)
            .field("member", &self.member)
            .field("arity", &self.arity)
            .field("returns", &self.returns_name)
            .finish()
    }
}

impl MethodHandle {
    /// Number of arguments the resolved overload takes
    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke with untyped arguments, returning the untyped result
    pub fn invoke(&self, args: Vec<DynValue>) -> Result<DynValue, AccessError> {
        if args.len() != self.arity {
            return Err(AccessError::NoMatchingOverload {
                component: self.scope.clone(),
                member: self.member.clone(),
                arity: args.len(),
            });
        }
        self.target
            .invoke(&self.member, args)
            .map_err(|reason| AccessError::InvocationFailed {
                component: self.scope.clone(),
                member: self.member.clone(),
                reason,
            })
    }

    /// Invoke and downcast the result to `R`
    pub fn invoke_as<R: Any>(&self, args: Vec<DynValue>) -> Result<R, AccessError> {
        if self.returns != TypeId::of::<R>() {
            return Err(AccessError::TypeMismatch {
                component: self.scope.clone(),
                member: self.member.clone(),
                expected: type_name::<R>(),
                found: self.returns_name,
            });
        }
        self.invoke(args)?
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| AccessError::Unreadable {
                component: self.scope.clone(),
                member: self.member.clone(),
                reason: format!("return value is not a {}", type_name::<R>()),
            })
    }
}

fn out_of_domain<T: Debug>(
    scope: &ComponentRef,
    member: &str,
    expected: &str,
    observed: &T,
) -> AccessError {
    AccessError::OutOfDomain {
        component: scope.clone(),
        member: member.to_string(),
        expected: expected.to_string(),
        observed: format!("{observed:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentId;
    use parking_lot::Mutex;

    struct Keypad {
        digits: Mutex<Vec<u8>>,
        pressed: Mutex<usize>,
    }

    impl Inspectable for Keypad {
        fn scope(&self) -> ComponentRef {
            ComponentRef::new(ComponentId(3), "keypad")
        }

        fn members(&self) -> Vec<MemberInfo> {
            vec![
                MemberInfo::field::<Vec<u8>>("digits").non_public(),
                MemberInfo::field::<usize>("pressed").non_public().writable(),
                MemberInfo::field::<bool>("locked").writable(),
                MemberInfo::property::<String>("label"),
                MemberInfo::property::<u8>("mode"),
                MemberInfo::property::<String>("mode").non_public(),
                MemberInfo::method::<u8>("digit_at", 1),
                MemberInfo::method::<u8>("digit_at", 2),
                MemberInfo::method::<usize>("count", 0),
            ]
        }

        fn read(&self, member: &str) -> Option<DynValue> {
            match member {
                "digits" => Some(Box::new(self.digits.lock().clone())),
                "pressed" => Some(Box::new(*self.pressed.lock())),
                "label" => Some(Box::new("keypad".to_string())),
                "mode" => Some(Box::new(2u8)),
                _ => None,
            }
        }

        fn write(&self, member: &str, value: DynValue) -> Result<(), String> {
            match member {
                "pressed" => {
                    let v = value.downcast::<usize>().map_err(|_| "bad type".to_string())?;
                    *self.pressed.lock() = *v;
                    Ok(())
                }
                "locked" => Err("keypad is sealed".to_string()),
                other => Err(format!("{other} not writable")),
            }
        }

        fn invoke(&self, member: &str, args: Vec<DynValue>) -> Result<DynValue, String> {
            match (member, args.len()) {
                ("count", 0) => Ok(Box::new(self.digits.lock().len())),
                ("digit_at", 1) => {
                    let idx = args
                        .into_iter()
                        .next()
                        .and_then(|a| a.downcast::<usize>().ok())
                        .ok_or("bad argument")?;
                    self.digits
                        .lock()
                        .get(*idx)
                        .copied()
                        .map(|d| Box::new(d) as DynValue)
                        .ok_or_else(|| "index out of range".to_string())
                }
                _ => Err("unsupported".to_string()),
            }
        }
    }

    fn keypad() -> Arc<dyn Inspectable> {
        Arc::new(Keypad {
            digits: Mutex::new(vec![4, 1, 7]),
            pressed: Mutex::new(0),
        })
    }

    #[test]
    fn field_reads_live_state() {
        let target = keypad();
        let pressed = get_field::<usize>(&target, "pressed", Visibility::NonPublic).unwrap();
        assert_eq!(pressed.get().unwrap(), 0);
        pressed.set(2).unwrap();
        assert_eq!(pressed.get().unwrap(), 2);
    }

    #[test]
    fn construction_rejects_wrong_type() {
        let target = keypad();
        let err = get_field::<u32>(&target, "pressed", Visibility::NonPublic).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
    }

    #[test]
    fn construction_rejects_missing_member() {
        let target = keypad();
        let err = get_field::<u8>(&target, "serial", Visibility::Any).unwrap_err();
        assert!(matches!(err, AccessError::MissingMember { .. }));
    }

    #[test]
    fn construction_rejects_wrong_visibility() {
        let target = keypad();
        let err = get_field::<usize>(&target, "pressed", Visibility::Public).unwrap_err();
        assert!(matches!(err, AccessError::VisibilityMismatch { .. }));
    }

    #[test]
    fn construction_rejects_wrong_kind() {
        let target = keypad();
        let err = get_field::<String>(&target, "label", Visibility::Any).unwrap_err();
        assert!(matches!(
            err,
            AccessError::KindMismatch {
                expected: MemberKind::Field,
                found: MemberKind::Property,
                ..
            }
        ));
    }

    #[test]
    fn read_only_property_rejects_set() {
        let target = keypad();
        let label = get_property::<String>(&target, "label", Visibility::Public).unwrap();
        assert_eq!(label.get().unwrap(), "keypad");
        assert!(matches!(
            label.set("x".to_string()),
            Err(AccessError::ReadOnly { .. })
        ));
    }

    #[test]
    fn refused_write_is_reported_as_write_failure() {
        let target = keypad();
        let locked = get_field::<bool>(&target, "locked", Visibility::Public).unwrap();
        let err = locked.set(true).unwrap_err();
        assert!(matches!(err, AccessError::WriteFailed { .. }));
        assert!(err.to_string().contains("could not be written"));
    }

    #[test]
    fn visibility_picks_between_same_named_members() {
        let target = keypad();
        let public = get_property::<u8>(&target, "mode", Visibility::Public).unwrap();
        assert_eq!(public.get().unwrap(), 2);

        let err = get_property::<u8>(&target, "mode", Visibility::NonPublic).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));

        let err = get_property::<u8>(&target, "mode", Visibility::Any).unwrap_err();
        assert!(matches!(
            err,
            AccessError::AmbiguousOverload { candidates: 2, .. }
        ));
    }

    #[test]
    fn validator_reports_expected_and_observed() {
        let target = keypad();
        let digits = get_array::<u8>(&target, "digits", Visibility::NonPublic).unwrap();
        let err = digits.get_each_checked("digit < 5", |d| *d < 5).unwrap_err();
        match err {
            AccessError::OutOfDomain {
                expected, observed, ..
            } => {
                assert_eq!(expected, "digit < 5");
                assert_eq!(observed, "7");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn range_check_on_field() {
        let target = keypad();
        let pressed = get_field::<usize>(&target, "pressed", Visibility::Any).unwrap();
        assert_eq!(pressed.get_in(0..3).unwrap(), 0);
        pressed.set(5).unwrap();
        assert!(matches!(
            pressed.get_in(0..3),
            Err(AccessError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn array_index_and_length() {
        let target = keypad();
        let digits = get_array::<u8>(&target, "digits", Visibility::Any).unwrap();
        assert_eq!(digits.len().unwrap(), 3);
        assert_eq!(digits.get_at(2).unwrap(), 7);
        assert!(digits.get_at(3).is_err());
        assert!(digits.get_exact(4).is_err());
    }

    #[test]
    fn method_overloads_need_disambiguation() {
        let target = keypad();
        let err = get_method(&target, "digit_at", Visibility::Any, None).unwrap_err();
        assert!(matches!(
            err,
            AccessError::AmbiguousOverload { candidates: 2, .. }
        ));

        let digit_at = get_method(&target, "digit_at", Visibility::Any, Some(1)).unwrap();
        let value: u8 = digit_at.invoke_as(vec![Box::new(1usize) as DynValue]).unwrap();
        assert_eq!(value, 1);

        assert!(matches!(
            get_method(&target, "digit_at", Visibility::Any, Some(3)),
            Err(AccessError::NoMatchingOverload { arity: 3, .. })
        ));
    }

    #[test]
    fn method_failure_is_scoped() {
        let target = keypad();
        let digit_at = get_method(&target, "digit_at", Visibility::Any, Some(1)).unwrap();
        let err = digit_at.invoke(vec![Box::new(10usize) as DynValue]).unwrap_err();
        assert!(matches!(err, AccessError::InvocationFailed { .. }));
        assert_eq!(err.component().kind, "keypad");
    }

    #[test]
    fn method_return_type_checked() {
        let target = keypad();
        let count = get_method(&target, "count", Visibility::Any, None).unwrap();
        assert_eq!(count.invoke_as::<usize>(Vec::new()).unwrap(), 3);
        assert!(matches!(
            count.invoke_as::<u8>(Vec::new()),
            Err(AccessError::TypeMismatch { .. })
        ));
    }
}
