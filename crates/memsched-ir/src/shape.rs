//! Shapes of instruction outputs.

use std::fmt;

/// Element type of an array shape.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum PrimitiveType {
    /// Boolean predicate.
    Pred,
    S8,
    S16,
    S32,
    S64,
    U8,
    U16,
    U32,
    U64,
    F16,
    BF16,
    F32,
    F64,
}

impl PrimitiveType {
    /// Width of one element in bytes.
    pub fn byte_width(self) -> u64 {
        match self {
            Self::Pred | Self::S8 | Self::U8 => 1,
            Self::S16 | Self::U16 | Self::F16 | Self::BF16 => 2,
            Self::S32 | Self::U32 | Self::F32 => 4,
            Self::S64 | Self::U64 | Self::F64 => 8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Pred => "pred",
            Self::S8 => "s8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::S64 => "s64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A path into a (possibly nested) tuple shape. The empty index denotes the
/// whole shape.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ShapeIndex(Vec<usize>);

impl ShapeIndex {
    /// The index of the top-level value.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new index with `element` appended.
    pub fn child(&self, element: usize) -> Self {
        let mut path = self.0.clone();
        path.push(element);
        Self(path)
    }

    /// Returns `prefix ++ self`.
    pub fn prefixed(&self, prefix: usize) -> Self {
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.push(prefix);
        path.extend_from_slice(&self.0);
        Self(path)
    }

    /// Splits off the first element, returning it with the remaining path.
    pub fn split_first(&self) -> Option<(usize, ShapeIndex)> {
        self.0
            .split_first()
            .map(|(first, rest)| (*first, ShapeIndex(rest.to_vec())))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for ShapeIndex {
    fn from(path: Vec<usize>) -> Self {
        Self(path)
    }
}

impl fmt::Display for ShapeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, element) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{element}")?;
        }
        f.write_str("}")
    }
}

/// The shape of an instruction output: a dense array or a tuple of shapes.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Shape {
    /// A dense array; scalars have no dimensions.
    Array {
        element_type: PrimitiveType,
        dims: Vec<u64>,
    },
    /// A tuple whose elements are shapes themselves.
    Tuple(Vec<Shape>),
}

impl Shape {
    pub fn scalar(element_type: PrimitiveType) -> Self {
        Self::Array {
            element_type,
            dims: Vec::new(),
        }
    }

    pub fn array(element_type: PrimitiveType, dims: &[u64]) -> Self {
        Self::Array {
            element_type,
            dims: dims.to_vec(),
        }
    }

    pub fn tuple(elements: Vec<Shape>) -> Self {
        Self::Tuple(elements)
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Self::Tuple(_))
    }

    /// Number of tuple elements, or `0` for arrays.
    pub fn tuple_len(&self) -> usize {
        match self {
            Self::Tuple(elements) => elements.len(),
            Self::Array { .. } => 0,
        }
    }

    /// Number of array elements (`1` for scalars, `0` for tuples).
    pub fn element_count(&self) -> u64 {
        match self {
            Self::Array { dims, .. } => dims.iter().product(),
            Self::Tuple(_) => 0,
        }
    }

    /// Returns the sub-shape at `index`, if the path exists.
    pub fn subshape(&self, index: &ShapeIndex) -> Option<&Shape> {
        let mut current = self;
        for &element in index.as_slice() {
            match current {
                Self::Tuple(elements) => current = elements.get(element)?,
                Self::Array { .. } => return None,
            }
        }
        Some(current)
    }

    /// All indices of this shape in pre-order: the shape itself first, then
    /// each tuple element recursively.
    pub fn indices(&self) -> Vec<ShapeIndex> {
        let mut out = Vec::new();
        collect_indices(self, ShapeIndex::root(), &mut out);
        out
    }

    /// Byte footprint of the top-level value of this shape.
    ///
    /// Arrays occupy `element_count * byte_width`; a tuple only occupies its
    /// table of element pointers, `pointer_size * tuple_len`. Tuple elements
    /// are separate values and are sized separately.
    pub fn byte_size(&self, pointer_size: u64) -> u64 {
        match self {
            Self::Array { element_type, .. } => self.element_count() * element_type.byte_width(),
            Self::Tuple(elements) => pointer_size * elements.len() as u64,
        }
    }
}

fn collect_indices(shape: &Shape, index: ShapeIndex, out: &mut Vec<ShapeIndex>) {
    if let Shape::Tuple(elements) = shape {
        out.push(index.clone());
        for (i, element) in elements.iter().enumerate() {
            collect_indices(element, index.child(i), out);
        }
    } else {
        out.push(index);
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array { element_type, dims } => {
                write!(f, "{element_type}[")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{d}")?;
                }
                f.write_str("]")
            }
            Self::Tuple(elements) => {
                f.write_str("(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(")")
            }
        }
    }
}
