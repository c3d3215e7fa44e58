//! IR-high type system (spec §3.1): a closed sum type over the handful of
//! shapes the front end ever assigns to an elaborated expression.

use std::rc::Rc;
use tmppy_util::Symbol;

/// A user-defined class: either a plain value type or, when `is_exception`
/// holds, a type that may be the target of `raise`/`except`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomType {
    pub name: Symbol,
    pub fields: Vec<(Symbol, HType)>,
    pub is_exception: bool,
    /// Present iff `is_exception`; the string literal from the class's
    /// mandatory `self.message = "..."` statement (spec §4.5).
    pub message: Option<String>,
}

/// The IR-high type of an elaborated expression or binding (spec §3.1).
///
/// Equality is structural, with one deliberate asymmetry carried over from
/// the original implementation (spec §9 Open Question): `Set` supports
/// equality only when compared directly, never when nested inside another
/// `List`/`Set`. That rule lives in the expression elaborator's
/// equality-support check ([`crate::expr::supports_equality`]), not here —
/// `HType`'s own `PartialEq` is plain structural equality throughout,
/// because two `Set[Set[int]]` values still denote the *same type* even
/// though the language never lets you write `==` between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HType {
    Bool,
    Int,
    /// An opaque "C++ type" value — the thing `Type("Foo")` produces.
    TypeRef,
    /// The type of an expression that never completes normally (a function
    /// body that only raises, or a branch that always-returns).
    Bottom,
    List(Box<HType>),
    Set(Box<HType>),
    Function {
        args: Vec<HType>,
        ret: Box<HType>,
    },
    /// `Rc` so cloning an `HType` referring to a large class is cheap and so
    /// `PartialEq` compares the pointee's fields structurally (two distinct
    /// `Rc`s wrapping equal `CustomType`s compare equal).
    Custom(Rc<CustomType>),
}

impl HType {
    pub fn list_of(elem: HType) -> HType {
        HType::List(Box::new(elem))
    }

    pub fn set_of(elem: HType) -> HType {
        HType::Set(Box::new(elem))
    }

    pub fn function(args: Vec<HType>, ret: HType) -> HType {
        HType::Function { args, ret: Box::new(ret) }
    }

    pub fn custom(ty: CustomType) -> HType {
        HType::Custom(Rc::new(ty))
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, HType::Bottom)
    }

    /// A short, human-readable rendering used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            HType::Bool => "bool".to_string(),
            HType::Int => "int".to_string(),
            HType::TypeRef => "Type".to_string(),
            HType::Bottom => "<bottom>".to_string(),
            HType::List(elem) => format!("List[{}]", elem.describe()),
            HType::Set(elem) => format!("Set[{}]", elem.describe()),
            HType::Function { args, ret } => {
                let args = args.iter().map(HType::describe).collect::<Vec<_>>().join(", ");
                format!("Callable[[{args}], {}]", ret.describe())
            }
            HType::Custom(ty) => ty.name.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_rc_identity() {
        let a = Rc::new(CustomType {
            name: Symbol::intern("Foo"),
            fields: vec![(Symbol::intern("x"), HType::Int)],
            is_exception: false,
            message: None,
        });
        let b = Rc::new(CustomType {
            name: Symbol::intern("Foo"),
            fields: vec![(Symbol::intern("x"), HType::Int)],
            is_exception: false,
            message: None,
        });
        assert_eq!(HType::Custom(a), HType::Custom(b));
    }

    #[test]
    fn distinct_shapes_are_unequal() {
        assert_ne!(HType::list_of(HType::Int), HType::set_of(HType::Int));
    }
}
