//! Static vocabularies of the context levels and name resolution.
//!
//! A bare identifier or call is tried against this property, this layer, this
//! composition and finally the global level. Accessors only match bare names,
//! functions only match calls. Anything left over is a user variable.

use crate::error::{ExpressionError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    OneOf(&'static [usize]),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::OneOf(counts) => counts.contains(&count),
        }
    }

    pub fn describe(self) -> String {
        match self {
            Arity::Exact(n) => n.to_string(),
            Arity::Range(min, usize::MAX) => format!("at least {}", min),
            Arity::Range(min, max) => format!("{} to {}", min, max),
            Arity::OneOf(counts) => counts
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    Accessor,
    Function {
        arity: Arity,
        params: &'static [&'static str],
    },
    /// Recognized name without an implementation.
    Unsupported { arity: Arity },
}

const ACCESSOR: Signature = Signature::Accessor;

const fn function(arity: Arity, params: &'static [&'static str]) -> Signature {
    Signature::Function { arity, params }
}

const fn unsupported(arity: Arity) -> Signature {
    Signature::Unsupported { arity }
}

impl Signature {
    pub fn params(self) -> &'static [&'static str] {
        match self {
            Signature::Function { params, .. } => params,
            _ => &[],
        }
    }
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $ty:ident {
            $($variant:ident = [$($alias:literal),+] => $sig:expr,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum $ty {
            $($variant,)*
        }

        impl $ty {
            pub fn lookup(name: &str) -> Option<Self> {
                match name {
                    $($($alias)|+ => Some($ty::$variant),)*
                    _ => None,
                }
            }

            pub fn signature(self) -> Signature {
                match self {
                    $($ty::$variant => $sig,)*
                }
            }

            /// Primary spelling of the name.
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => [$($alias),+][0],)*
                }
            }
        }
    };
}

vocabulary! {
    /// Global functions and objects.
    pub enum GlobalOp {
        Time = ["time"] => ACCESSOR,
        ThisComp = ["thisComp"] => ACCESSOR,
        ThisLayer = ["thisLayer"] => ACCESSOR,
        ThisProperty = ["thisProperty"] => ACCESSOR,
        Math = ["Math"] => ACCESSOR,
        Comp = ["comp"] => function(Arity::Exact(1), &["name"]),
        Add = ["add", "$bm_sum", "sum"] => function(Arity::Exact(2), &["vec1", "vec2"]),
        Sub = ["sub", "$bm_sub"] => function(Arity::Exact(2), &["vec1", "vec2"]),
        Mul = ["mul", "$bm_mul"] => function(Arity::Exact(2), &["vec", "amount"]),
        Div = ["div", "$bm_div"] => function(Arity::Exact(2), &["vec", "amount"]),
        Mod = ["mod", "$bm_mod"] => function(Arity::Exact(2), &["vec", "amount"]),
        Clamp = ["clamp"] => function(Arity::Exact(3), &["value", "limit1", "limit2"]),
        Dot = ["dot"] => function(Arity::Exact(2), &["vec1", "vec2"]),
        Cross = ["cross"] => unsupported(Arity::Exact(2)),
        Length = ["length"] => function(Arity::Range(1, 2), &["vec", "point2"]),
        Normalize = ["normalize"] => function(Arity::Exact(1), &["vec"]),
        LookAt = ["lookAt"] => function(Arity::Exact(2), &["fromPoint", "atPoint"]),
        DegreesToRadians = ["degreesToRadians"] => function(Arity::Exact(1), &["degrees"]),
        RadiansToDegrees = ["radiansToDegrees"] => function(Arity::Exact(1), &["radians"]),
        TimeToFrames = ["timeToFrames"] => function(Arity::Range(0, 3), &["t", "fps", "isDuration"]),
        FramesToTime = ["framesToTime"] => function(Arity::Range(1, 2), &["frames", "fps"]),
        SeedRandom = ["seedRandom"] => function(Arity::Range(1, 2), &["offset", "timeless"]),
        Random = ["random"] => function(Arity::Range(0, 2), &["maxValOrArray1", "maxValOrArray2"]),
        GaussRandom = ["gaussRandom"] => function(Arity::Range(0, 2), &["maxValOrArray1", "maxValOrArray2"]),
        Noise = ["noise"] => function(Arity::Exact(1), &["valOrArray"]),
        Linear = ["linear"] => function(Arity::OneOf(&[3, 5]), &["t", "tMin", "tMax", "value1", "value2"]),
        Ease = ["ease"] => function(Arity::OneOf(&[3, 5]), &["t", "tMin", "tMax", "value1", "value2"]),
        EaseIn = ["easeIn"] => function(Arity::OneOf(&[3, 5]), &["t", "tMin", "tMax", "value1", "value2"]),
        EaseOut = ["easeOut"] => function(Arity::OneOf(&[3, 5]), &["t", "tMin", "tMax", "value1", "value2"]),
        HslToRgb = ["hslToRgb"] => function(Arity::Exact(1), &["hsla"]),
        RgbToHsl = ["rgbToHsl"] => function(Arity::Exact(1), &["rgba"]),
    }
}

vocabulary! {
    /// Members of a property handle; `thisProperty` at the top level.
    pub enum PropertyMember {
        Value = ["value"] => ACCESSOR,
        Velocity = ["velocity"] => ACCESSOR,
        Speed = ["speed"] => ACCESSOR,
        NumKeys = ["numKeys"] => ACCESSOR,
        ValueAtTime = ["valueAtTime"] => function(Arity::Exact(1), &["t"]),
        VelocityAtTime = ["velocityAtTime"] => function(Arity::Exact(1), &["t"]),
        SpeedAtTime = ["speedAtTime"] => function(Arity::Exact(1), &["t"]),
        Wiggle = ["wiggle"] => function(Arity::Range(2, 5), &["freq", "amp", "octaves", "amp_mult", "t"]),
        LoopOut = ["loopOut"] => function(Arity::Range(0, 2), &["type", "numKeyframes"]),
        LoopIn = ["loopIn"] => function(Arity::Range(0, 2), &["type", "numKeyframes"]),
        LoopOutDuration = ["loopOutDuration"] => function(Arity::Range(0, 2), &["type", "duration"]),
        LoopInDuration = ["loopInDuration"] => function(Arity::Range(0, 2), &["type", "duration"]),
    }
}

vocabulary! {
    /// Members of a layer; `thisLayer` at the top level.
    pub enum LayerMember {
        Index = ["index"] => ACCESSOR,
        Name = ["name"] => ACCESSOR,
        InPoint = ["inPoint"] => ACCESSOR,
        OutPoint = ["outPoint"] => ACCESSOR,
        StartTime = ["startTime"] => ACCESSOR,
        Source = ["source"] => ACCESSOR,
        Active = ["active"] => ACCESSOR,
        Enabled = ["enabled"] => ACCESSOR,
        HasParent = ["hasParent"] => ACCESSOR,
        Parent = ["parent"] => ACCESSOR,
        Transform = ["transform"] => ACCESSOR,
        AnchorPoint = ["anchorPoint"] => ACCESSOR,
        Position = ["position"] => ACCESSOR,
        Scale = ["scale"] => ACCESSOR,
        Rotation = ["rotation"] => ACCESSOR,
        Opacity = ["opacity"] => ACCESSOR,
        TimeRemap = ["timeRemap"] => ACCESSOR,
        Width = ["width"] => ACCESSOR,
        Height = ["height"] => ACCESSOR,
        HasAudio = ["hasAudio"] => ACCESSOR,
        HasVideo = ["hasVideo"] => ACCESSOR,
        AudioActive = ["audioActive"] => ACCESSOR,
        Content = ["content"] => function(Arity::Exact(1), &["name"]),
        Effect = ["effect"] => function(Arity::Exact(1), &["name"]),
        ToComp = ["toComp"] => function(Arity::Range(1, 2), &["point", "t"]),
        FromComp = ["fromComp"] => function(Arity::Range(1, 2), &["point", "t"]),
        ToWorld = ["toWorld"] => function(Arity::Range(1, 2), &["point", "t"]),
        FromWorld = ["fromWorld"] => function(Arity::Range(1, 2), &["point", "t"]),
        SourceRectAtTime = ["sourceRectAtTime"] => unsupported(Arity::Range(0, 2)),
        SampleImage = ["sampleImage"] => unsupported(Arity::Range(1, 4)),
    }
}

vocabulary! {
    /// Members of a composition; `thisComp` at the top level.
    pub enum CompMember {
        Layer = ["layer"] => function(Arity::Exact(1), &["index"]),
        NumLayers = ["numLayers"] => ACCESSOR,
        Width = ["width"] => ACCESSOR,
        Height = ["height"] => ACCESSOR,
        FrameDuration = ["frameDuration"] => ACCESSOR,
        Duration = ["duration"] => ACCESSOR,
        Name = ["name"] => ACCESSOR,
    }
}

vocabulary! {
    pub enum TransformMember {
        AnchorPoint = ["anchorPoint"] => ACCESSOR,
        Position = ["position"] => ACCESSOR,
        Scale = ["scale"] => ACCESSOR,
        Rotation = ["rotation", "zRotation"] => ACCESSOR,
        Opacity = ["opacity"] => ACCESSOR,
    }
}

vocabulary! {
    pub enum EffectMember {
        Name = ["name"] => ACCESSOR,
        NumProperties = ["numProperties"] => ACCESSOR,
        Active = ["active", "enabled"] => ACCESSOR,
        Param = ["param"] => function(Arity::Exact(1), &["name"]),
    }
}

vocabulary! {
    /// Members of a shape group; other names look up the item's properties.
    pub enum ContentMember {
        Name = ["name"] => ACCESSOR,
        NumProperties = ["numProperties"] => ACCESSOR,
        Transform = ["transform"] => ACCESSOR,
        Content = ["content"] => function(Arity::Exact(1), &["name"]),
    }
}

vocabulary! {
    pub enum MathMember {
        Pi = ["PI"] => ACCESSOR,
        E = ["E"] => ACCESSOR,
        Sqrt2 = ["SQRT2"] => ACCESSOR,
        Ln2 = ["LN2"] => ACCESSOR,
        Ln10 = ["LN10"] => ACCESSOR,
        Abs = ["abs"] => function(Arity::Exact(1), &["x"]),
        Acos = ["acos"] => function(Arity::Exact(1), &["x"]),
        Asin = ["asin"] => function(Arity::Exact(1), &["x"]),
        Atan = ["atan"] => function(Arity::Exact(1), &["x"]),
        Atan2 = ["atan2"] => function(Arity::Exact(2), &["y", "x"]),
        Ceil = ["ceil"] => function(Arity::Exact(1), &["x"]),
        Cos = ["cos"] => function(Arity::Exact(1), &["x"]),
        Exp = ["exp"] => function(Arity::Exact(1), &["x"]),
        Floor = ["floor"] => function(Arity::Exact(1), &["x"]),
        Log = ["log"] => function(Arity::Exact(1), &["x"]),
        Round = ["round"] => function(Arity::Exact(1), &["x"]),
        Sign = ["sign"] => function(Arity::Exact(1), &["x"]),
        Sin = ["sin"] => function(Arity::Exact(1), &["x"]),
        Sqrt = ["sqrt"] => function(Arity::Exact(1), &["x"]),
        Tan = ["tan"] => function(Arity::Exact(1), &["x"]),
        Trunc = ["trunc"] => function(Arity::Exact(1), &["x"]),
        Pow = ["pow"] => function(Arity::Exact(2), &["x", "y"]),
        Min = ["min"] => function(Arity::Range(0, usize::MAX), &[]),
        Max = ["max"] => function(Arity::Range(0, usize::MAX), &[]),
        Hypot = ["hypot"] => function(Arity::Range(0, usize::MAX), &[]),
        Random = ["random"] => function(Arity::Exact(0), &[]),
    }
}

/// A name bound to one of the implicit context levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Property(PropertyMember),
    Layer(LayerMember),
    Comp(CompMember),
    Global(GlobalOp),
}

/// Matches `signature` against a use site: `None` for a bare name, `Some(n)`
/// for a call with `n` arguments.
///
/// Returns `Ok(false)` when the form does not fit (accessor called, function
/// named bare) and an arity error when the call has the wrong argument count.
pub fn check_use(signature: Signature, name: &str, call: Option<usize>) -> Result<bool> {
    match (signature, call) {
        (Signature::Accessor, None) => Ok(true),
        (Signature::Accessor, Some(_)) | (_, None) => Ok(false),
        (Signature::Function { arity, .. } | Signature::Unsupported { arity }, Some(count)) => {
            if arity.accepts(count) {
                Ok(true)
            } else {
                Err(ExpressionError::Arity {
                    name: name.to_string(),
                    expected: arity.describe(),
                    found: count,
                })
            }
        }
    }
}

/// Resolves a bare name (`call == None`) or a call through the context levels.
pub fn resolve(name: &str, call: Option<usize>) -> Result<Option<Builtin>> {
    if let Some(m) = PropertyMember::lookup(name) {
        if check_use(m.signature(), name, call)? {
            return Ok(Some(Builtin::Property(m)));
        }
    }
    if let Some(m) = LayerMember::lookup(name) {
        if check_use(m.signature(), name, call)? {
            return Ok(Some(Builtin::Layer(m)));
        }
    }
    if let Some(m) = CompMember::lookup(name) {
        if check_use(m.signature(), name, call)? {
            return Ok(Some(Builtin::Comp(m)));
        }
    }
    if let Some(op) = GlobalOp::lookup(name) {
        if check_use(op.signature(), name, call)? {
            return Ok(Some(Builtin::Global(op)));
        }
    }
    Ok(None)
}

impl Builtin {
    pub fn signature(self) -> Signature {
        match self {
            Builtin::Property(m) => m.signature(),
            Builtin::Layer(m) => m.signature(),
            Builtin::Comp(m) => m.signature(),
            Builtin::Global(op) => op.signature(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Property(m) => m.name(),
            Builtin::Layer(m) => m.name(),
            Builtin::Comp(m) => m.name(),
            Builtin::Global(op) => op.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_level_order() {
        assert_eq!(
            resolve("value", None).unwrap(),
            Some(Builtin::Property(PropertyMember::Value))
        );
        // layer wins over composition
        assert_eq!(
            resolve("name", None).unwrap(),
            Some(Builtin::Layer(LayerMember::Name))
        );
        assert_eq!(
            resolve("layer", Some(1)).unwrap(),
            Some(Builtin::Comp(CompMember::Layer))
        );
        assert_eq!(
            resolve("$bm_sum", Some(2)).unwrap(),
            Some(Builtin::Global(GlobalOp::Add))
        );
    }

    #[test]
    fn test_accessors_and_functions_do_not_mix() {
        // bare function name falls through to a variable
        assert_eq!(resolve("length", None).unwrap(), None);
        assert_eq!(resolve("time", Some(0)).unwrap(), None);
        assert_eq!(resolve("myVariable", None).unwrap(), None);
    }

    #[test]
    fn test_arity_error_names_builtin() {
        let err = resolve("clamp", Some(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arity);
        let message = err.to_string();
        assert!(message.contains("clamp") && message.contains('3'), "{}", message);

        let err = resolve("linear", Some(4)).unwrap_err();
        assert!(err.to_string().contains("3 or 5"));
    }

    #[test]
    fn test_primary_name() {
        assert_eq!(GlobalOp::Add.name(), "add");
        assert_eq!(Builtin::Layer(LayerMember::ToComp).name(), "toComp");
    }

    #[test]
    fn test_unsupported_names_resolve() {
        assert_eq!(
            resolve("cross", Some(2)).unwrap(),
            Some(Builtin::Global(GlobalOp::Cross))
        );
        assert_eq!(
            resolve("sampleImage", Some(1)).unwrap(),
            Some(Builtin::Layer(LayerMember::SampleImage))
        );
    }
}
