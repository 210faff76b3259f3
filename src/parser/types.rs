use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

impl IntKind {
    fn rank(self) -> u8 {
        match self {
            IntKind::Char => 1,
            IntKind::Short => 2,
            IntKind::Int => 3,
            IntKind::Long => 4,
            IntKind::LongLong => 5,
        }
    }

    /// Width in bits on the LP64 targets the checker models
    pub fn width(self) -> u32 {
        match self {
            IntKind::Char => 8,
            IntKind::Short => 16,
            IntKind::Int => 32,
            IntKind::Long | IntKind::LongLong => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FloatKind {
    Float,
    Double,
    LongDouble,
}

/// Canonical static type of an expression or declaration, typedefs already resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Integer { kind: IntKind, signed: bool },
    Floating(FloatKind),
    Enum(String),
    Pointer(Box<Type>),
    Array(Box<Type>, Option<u64>),
    Function { ret: Box<Type>, params: Vec<Type> },
}

impl Type {
    pub const INT: Type = Type::Integer {
        kind: IntKind::Int,
        signed: true,
    };

    pub fn int(kind: IntKind, signed: bool) -> Self {
        Type::Integer { kind, signed }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    /// bool and the integer types; enumerations are their own category
    pub fn is_integral(&self) -> bool {
        matches!(self, Type::Bool | Type::Integer { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Type::Enum(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Floating(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_) | Type::Array(..))
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integral() || self.is_enum() || self.is_floating()
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Type::Integer { signed: true, .. })
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, Type::Integer { signed: false, .. })
    }

    pub fn in_category(&self, category: TypeCategory) -> bool {
        match category {
            TypeCategory::Boolean => self.is_bool(),
            TypeCategory::Integral => self.is_integral(),
            TypeCategory::Enumeral => self.is_enum(),
            TypeCategory::Floating => self.is_floating(),
            TypeCategory::SignedInteger => self.is_signed_integer(),
            TypeCategory::UnsignedInteger => self.is_unsigned_integer(),
            TypeCategory::Pointer => self.is_pointer(),
            TypeCategory::Void => matches!(self, Type::Void),
        }
    }

    /// The pointer an array decays to, or the type itself
    pub fn decayed(&self) -> Type {
        match self {
            Type::Array(element, _) => Type::Pointer(element.clone()),
            other => other.clone(),
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) | Type::Array(inner, _) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Integer { kind, signed } => {
                let base = match kind {
                    IntKind::Char => "char",
                    IntKind::Short => "short",
                    IntKind::Int => "int",
                    IntKind::Long => "long",
                    IntKind::LongLong => "long long",
                };
                if *signed {
                    write!(f, "{base}")
                } else {
                    write!(f, "unsigned {base}")
                }
            }
            Type::Floating(FloatKind::Float) => write!(f, "float"),
            Type::Floating(FloatKind::Double) => write!(f, "double"),
            Type::Floating(FloatKind::LongDouble) => write!(f, "long double"),
            Type::Enum(name) => write!(f, "enum {name}"),
            Type::Pointer(inner) => write!(f, "{inner} *"),
            Type::Array(element, Some(len)) => write!(f, "{element}[{len}]"),
            Type::Array(element, None) => write!(f, "{element}[]"),
            Type::Function { ret, params } => {
                write!(f, "{ret} (")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Coarse type classes that patterns can test for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Boolean,
    Integral,
    Enumeral,
    Floating,
    SignedInteger,
    UnsignedInteger,
    Pointer,
    Void,
}

impl TypeCategory {
    pub const ALL: [TypeCategory; 8] = [
        TypeCategory::Boolean,
        TypeCategory::Integral,
        TypeCategory::Enumeral,
        TypeCategory::Floating,
        TypeCategory::SignedInteger,
        TypeCategory::UnsignedInteger,
        TypeCategory::Pointer,
        TypeCategory::Void,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TypeCategory::Boolean => "boolean",
            TypeCategory::Integral => "integral",
            TypeCategory::Enumeral => "enumeral",
            TypeCategory::Floating => "floating",
            TypeCategory::SignedInteger => "signed_integer",
            TypeCategory::UnsignedInteger => "unsigned_integer",
            TypeCategory::Pointer => "pointer",
            TypeCategory::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.name() == name)
    }
}

/// Conversion performed by an implicit or explicit cast node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    IntegralCast,
    IntegralToBoolean,
    IntegralToFloating,
    IntegralToPointer,
    FloatingToIntegral,
    FloatingToBoolean,
    FloatingCast,
    PointerToBoolean,
    PointerToIntegral,
    ArrayToPointerDecay,
    BitCast,
    ToVoid,
    NoOp,
}

impl CastKind {
    pub const ALL: [CastKind; 13] = [
        CastKind::IntegralCast,
        CastKind::IntegralToBoolean,
        CastKind::IntegralToFloating,
        CastKind::IntegralToPointer,
        CastKind::FloatingToIntegral,
        CastKind::FloatingToBoolean,
        CastKind::FloatingCast,
        CastKind::PointerToBoolean,
        CastKind::PointerToIntegral,
        CastKind::ArrayToPointerDecay,
        CastKind::BitCast,
        CastKind::ToVoid,
        CastKind::NoOp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CastKind::IntegralCast => "IntegralCast",
            CastKind::IntegralToBoolean => "IntegralToBoolean",
            CastKind::IntegralToFloating => "IntegralToFloating",
            CastKind::IntegralToPointer => "IntegralToPointer",
            CastKind::FloatingToIntegral => "FloatingToIntegral",
            CastKind::FloatingToBoolean => "FloatingToBoolean",
            CastKind::FloatingCast => "FloatingCast",
            CastKind::PointerToBoolean => "PointerToBoolean",
            CastKind::PointerToIntegral => "PointerToIntegral",
            CastKind::ArrayToPointerDecay => "ArrayToPointerDecay",
            CastKind::BitCast => "BitCast",
            CastKind::ToVoid => "ToVoid",
            CastKind::NoOp => "NoOp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Classifies the conversion from `from` to `to`, `None` when no conversion is needed
/// or the pair is not convertible.
pub fn cast_kind(from: &Type, to: &Type) -> Option<CastKind> {
    if from == to {
        return None;
    }

    let from_integral = from.is_integral() || from.is_enum();

    match to {
        Type::Void => Some(CastKind::ToVoid),
        Type::Bool if from_integral => Some(CastKind::IntegralToBoolean),
        Type::Bool if from.is_floating() => Some(CastKind::FloatingToBoolean),
        Type::Bool if from.is_pointer() => Some(CastKind::PointerToBoolean),
        Type::Integer { .. } | Type::Enum(_) if from_integral => Some(CastKind::IntegralCast),
        Type::Integer { .. } | Type::Enum(_) if from.is_floating() => {
            Some(CastKind::FloatingToIntegral)
        }
        Type::Integer { .. } | Type::Enum(_) if from.is_pointer() => {
            Some(CastKind::PointerToIntegral)
        }
        Type::Floating(_) if from_integral => Some(CastKind::IntegralToFloating),
        Type::Floating(_) if from.is_floating() => Some(CastKind::FloatingCast),
        Type::Pointer(_) if matches!(from, Type::Array(..)) => {
            Some(CastKind::ArrayToPointerDecay)
        }
        Type::Pointer(_) if from_integral => Some(CastKind::IntegralToPointer),
        Type::Pointer(_) if from.is_pointer() => Some(CastKind::BitCast),
        _ => None,
    }
}

/// Integral promotion: bool, enums and integers narrower than `int` become `int`
pub fn promote(ty: &Type) -> Type {
    match ty {
        Type::Bool | Type::Enum(_) => Type::INT,
        Type::Integer { kind, .. } if kind.rank() < IntKind::Int.rank() => Type::INT,
        other => other.clone(),
    }
}

/// Common type of the operands of a binary arithmetic, relational or bitwise operator
pub fn usual_arithmetic(lhs: &Type, rhs: &Type) -> Type {
    match (lhs, rhs) {
        (Type::Floating(a), Type::Floating(b)) => return Type::Floating((*a).max(*b)),
        (Type::Floating(a), _) | (_, Type::Floating(a)) => return Type::Floating(*a),
        _ => {}
    }

    let lhs = promote(lhs);
    let rhs = promote(rhs);

    match (&lhs, &rhs) {
        (Type::Integer { kind: lk, signed: ls }, Type::Integer { kind: rk, signed: rs }) => {
            let (lk, ls, rk, rs) = (*lk, *ls, *rk, *rs);
            if lk == rk && ls == rs {
                return lhs;
            }
            if ls == rs {
                return if lk.rank() >= rk.rank() { lhs } else { rhs };
            }
            let (unsigned_kind, signed_kind) = if ls { (rk, lk) } else { (lk, rk) };
            if unsigned_kind.rank() >= signed_kind.rank() {
                Type::int(unsigned_kind, false)
            } else if signed_kind.width() > unsigned_kind.width() {
                Type::int(signed_kind, true)
            } else {
                Type::int(signed_kind, false)
            }
        }
        // pointer arithmetic and comparisons keep the pointer side
        (Type::Pointer(_) | Type::Array(..), _) => lhs.decayed(),
        (_, Type::Pointer(_) | Type::Array(..)) => rhs.decayed(),
        _ => lhs,
    }
}

/// Whether a numeric constant's spelling denotes a floating literal
pub fn is_floating_literal(spelling: &str) -> bool {
    let lower = spelling.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower.contains('.') || lower.contains('p')
    } else {
        lower.contains('.') || lower.contains('e')
    }
}

pub fn floating_literal_type(spelling: &str) -> Type {
    match spelling.chars().last() {
        Some('f' | 'F') => Type::Floating(FloatKind::Float),
        Some('l' | 'L') => Type::Floating(FloatKind::LongDouble),
        _ => Type::Floating(FloatKind::Double),
    }
}

struct IntegerLiteral<'a> {
    value: u64,
    radix: u32,
    suffix: &'a str,
}

fn split_integer_literal(spelling: &str) -> Option<IntegerLiteral<'_>> {
    let digits_end = spelling
        .char_indices()
        .rev()
        .take_while(|(_, c)| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(spelling.len());
    let (digits, suffix) = spelling.split_at(digits_end);

    let lower = digits.to_ascii_lowercase();
    let (body, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    let value = u64::from_str_radix(body, radix).ok()?;

    Some(IntegerLiteral {
        value,
        radix,
        suffix,
    })
}

/// Value of an integer constant, `None` if the spelling is not a valid integer constant
pub fn integer_literal_value(spelling: &str) -> Option<u64> {
    split_integer_literal(spelling).map(|literal| literal.value)
}

/// Type of an integer literal from its value and suffix, `None` if the spelling is not a
/// valid integer constant or its value does not fit any candidate type.
pub fn integer_literal_type(spelling: &str) -> Option<Type> {
    let IntegerLiteral {
        value,
        radix,
        suffix,
    } = split_integer_literal(spelling)?;

    let suffix_lower = suffix.to_ascii_lowercase();
    let unsigned = suffix_lower.contains('u');
    let longs = suffix_lower.matches('l').count();
    if longs > 2 || suffix_lower.matches('u').count() > 1 {
        return None;
    }

    let start = match longs {
        0 => IntKind::Int,
        1 => IntKind::Long,
        _ => IntKind::LongLong,
    };
    let kinds = [IntKind::Int, IntKind::Long, IntKind::LongLong]
        .into_iter()
        .filter(|kind| kind.rank() >= start.rank());

    for kind in kinds {
        let signed_max = (1u64 << (kind.width() - 1)) - 1;
        let unsigned_max = if kind.width() == 64 {
            u64::MAX
        } else {
            (1u64 << kind.width()) - 1
        };
        if !unsigned && value <= signed_max {
            return Some(Type::int(kind, true));
        }
        // decimal literals without `u` never become unsigned
        if (unsigned || radix != 10) && value <= unsigned_max {
            return Some(Type::int(kind, false));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint() -> Type {
        Type::int(IntKind::Int, false)
    }

    #[test]
    fn promotion_widens_small_types_to_int() {
        assert_eq!(promote(&Type::Bool), Type::INT);
        assert_eq!(promote(&Type::int(IntKind::Char, false)), Type::INT);
        assert_eq!(promote(&Type::Enum("Color".into())), Type::INT);
        assert_eq!(promote(&uint()), uint());
    }

    #[test]
    fn usual_arithmetic_conversions() {
        assert_eq!(usual_arithmetic(&Type::INT, &uint()), uint());
        assert_eq!(
            usual_arithmetic(&Type::int(IntKind::Long, true), &uint()),
            Type::int(IntKind::Long, true)
        );
        assert_eq!(
            usual_arithmetic(&Type::int(IntKind::Short, false), &Type::Bool),
            Type::INT
        );
        assert_eq!(
            usual_arithmetic(&Type::INT, &Type::Floating(FloatKind::Float)),
            Type::Floating(FloatKind::Float)
        );
    }

    #[test]
    fn cast_kinds() {
        assert_eq!(cast_kind(&Type::INT, &Type::Bool), Some(CastKind::IntegralToBoolean));
        assert_eq!(
            cast_kind(&Type::Floating(FloatKind::Double), &Type::INT),
            Some(CastKind::FloatingToIntegral)
        );
        assert_eq!(
            cast_kind(&Type::Enum("E".into()), &Type::INT),
            Some(CastKind::IntegralCast)
        );
        assert_eq!(cast_kind(&Type::INT, &Type::INT), None);
    }

    #[test]
    fn literal_types_follow_suffix_and_value() {
        assert_eq!(integer_literal_type("10"), Some(Type::INT));
        assert_eq!(integer_literal_type("010U"), Some(uint()));
        assert_eq!(integer_literal_type("0xFFFFFFFF"), Some(uint()));
        assert_eq!(
            integer_literal_type("4294967295"),
            Some(Type::int(IntKind::Long, true))
        );
        assert_eq!(
            integer_literal_type("10ul"),
            Some(Type::int(IntKind::Long, false))
        );
        assert_eq!(integer_literal_type("08"), None);
        assert!(is_floating_literal("1.5e-3f"));
        assert!(!is_floating_literal("0xE"));
        assert_eq!(floating_literal_type("1.5f"), Type::Floating(FloatKind::Float));
    }

    #[test]
    fn category_names_round_trip() {
        for category in TypeCategory::ALL {
            assert_eq!(TypeCategory::from_name(category.name()), Some(category));
        }
        assert!(!Type::Bool.in_category(TypeCategory::UnsignedInteger));
        assert!(!Type::Enum("E".into()).in_category(TypeCategory::Integral));
    }
}
