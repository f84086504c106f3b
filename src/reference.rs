//! Labeled-axis tensor values (`Reference`) — the currency concepts pass
//! between inferences.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};

/// A single cell of a [`Reference`] tensor.
///
/// `Skip` is a first-class variant, not a sentinel string — a cell that was
/// never populated because a timing gate skipped its producing item is
/// distinguishable from a cell that genuinely holds no value (`Null`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Skip,
}

impl Value {
    pub fn is_skip(&self) -> bool {
        matches!(self, Value::Skip)
    }

    /// Convert a plain (untagged) `serde_json::Value` — as used by repo
    /// files' `reference_data` and the CLI's `override_value` argument —
    /// into a `Value`. Distinct from `Value`'s own tagged `Deserialize`
    /// impl, which round-trips checkpoint blobs instead.
    pub fn from_untagged_json(json: serde_json::Value) -> Result<Self, String> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    return Err(format!("unsupported number: {n}"));
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_untagged_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            serde_json::Value::Object(_) => return Err("objects are not a valid reference value".to_string()),
        })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Skip => write!(f, "<skip>"),
        }
    }
}

/// A labeled-axis tensor: a flat cell buffer plus a shape and a name for
/// each axis. Axis order is significant and fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    axis_names: Vec<String>,
    shape: Vec<usize>,
    cells: Vec<Value>,
}

impl Reference {
    /// Build a reference from a flat nested-list structure, deriving shape
    /// from the extent of each nesting level. `axis_names`, if given, must
    /// match the derived rank; otherwise axes are named `axis0`, `axis1`, ...
    pub fn from_nested(data: Value, axis_names: Option<Vec<String>>) -> OrchestratorResult<Self> {
        let mut shape = Vec::new();
        Self::derive_shape(&data, &mut shape);
        let rank = shape.len();

        let axis_names = match axis_names {
            Some(names) => {
                if names.len() != rank {
                    debug!(rank, given = names.len(), "Reference::from_nested: axis name count mismatch, padding with defaults");
                }
                (0..rank)
                    .map(|i| names.get(i).cloned().unwrap_or_else(|| format!("axis{i}")))
                    .collect()
            }
            None => (0..rank).map(|i| format!("axis{i}")).collect(),
        };

        let mut seen = std::collections::HashSet::new();
        for name in &axis_names {
            if !seen.insert(name.clone()) {
                return Err(OrchestratorError::DuplicateAxis(name.clone()));
            }
        }

        let mut cells = Vec::new();
        Self::flatten(&data, &mut cells);

        debug!(?axis_names, ?shape, cell_count = cells.len(), "Reference::from_nested: built");
        Ok(Self {
            axis_names,
            shape,
            cells,
        })
    }

    /// Build a reference that holds a single scalar value on a zero-rank
    /// (empty) axis list.
    pub fn scalar(value: Value) -> Self {
        Self {
            axis_names: Vec::new(),
            shape: Vec::new(),
            cells: vec![value],
        }
    }

    /// A reference whose sole cell is the skip marker — produced when a
    /// timing gate causes a concept to be skipped rather than computed.
    pub fn skipped() -> Self {
        Self::scalar(Value::Skip)
    }

    pub fn axis_names(&self) -> &[String] {
        &self.axis_names
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }

    pub fn rank(&self) -> usize {
        self.axis_names.len()
    }

    pub fn is_skip(&self) -> bool {
        self.cells.iter().all(Value::is_skip)
    }

    /// Position of a named axis, if present.
    pub fn axis_position(&self, name: &str) -> Option<usize> {
        self.axis_names.iter().position(|n| n == name)
    }

    /// Align `self` and `other` on every axis name they share (paired
    /// index-for-index; shared axes must have equal extent) and take the
    /// outer product over axes that appear in only one side. Each resulting
    /// cell is a two-element list pairing `self`'s and `other`'s
    /// contributing value.
    ///
    /// In dev mode, a shared-axis extent mismatch raises. Otherwise the
    /// whole result collapses to a single skip cell.
    pub fn cross_product(&self, other: &Reference, dev_mode: bool) -> OrchestratorResult<Reference> {
        for name in &self.axis_names {
            if let Some(other_pos) = other.axis_position(name) {
                let self_pos = self.axis_position(name).expect("name came from self.axis_names");
                let (expected, actual) = (self.shape[self_pos], other.shape[other_pos]);
                if expected != actual {
                    return Self::fail_or_skip(dev_mode, || OrchestratorError::AxisLengthMismatch {
                        axis: name.clone(),
                        expected,
                        actual,
                    });
                }
            }
        }

        let other_only: Vec<String> = other.axis_names.iter().filter(|name| self.axis_position(name).is_none()).cloned().collect();

        let mut axis_names = self.axis_names.clone();
        axis_names.extend(other_only.iter().cloned());
        let mut shape = self.shape.clone();
        for name in &other_only {
            shape.push(other.shape[other.axis_position(name).expect("name came from other.axis_names")]);
        }

        let self_strides = row_major_strides(&self.shape);
        let other_strides = row_major_strides(&other.shape);
        let self_rank = self.rank();

        let mut cells = Vec::with_capacity(cell_count(&shape));
        for idx in each_multi_index(&shape) {
            let self_idx = &idx[..self_rank];
            let self_value = self.cells[flat_index(&self_strides, self_idx)].clone();

            let mut other_idx = vec![0usize; other.rank()];
            for (pos, name) in other.axis_names.iter().enumerate() {
                other_idx[pos] = match self.axis_position(name) {
                    Some(self_pos) => self_idx[self_pos],
                    None => {
                        let suffix_pos = other_only.iter().position(|n| n == name).expect("other-only axis listed above");
                        idx[self_rank + suffix_pos]
                    }
                };
            }
            let other_value = other.cells[flat_index(&other_strides, &other_idx)].clone();

            cells.push(Value::List(vec![self_value, other_value]));
        }

        Ok(Reference { axis_names, shape, cells })
    }

    /// Read the sub-tensor obtained by fixing the named axes in `slice` to
    /// specific indices. Axes not mentioned are carried through, in their
    /// original relative order, at full extent.
    ///
    /// In dev mode, an unknown axis name or an out-of-range index raises.
    /// Otherwise the result collapses to a single skip cell.
    pub fn tensor_read(&self, slice: &[(String, usize)], dev_mode: bool) -> OrchestratorResult<Reference> {
        let (fixed, kept_positions) = match self.resolve_slice(slice, dev_mode)? {
            Ok(resolved) => resolved,
            Err(()) => return Ok(Reference::skipped()),
        };

        let axis_names: Vec<String> = kept_positions.iter().map(|&p| self.axis_names[p].clone()).collect();
        let shape: Vec<usize> = kept_positions.iter().map(|&p| self.shape[p]).collect();
        let strides = row_major_strides(&self.shape);

        let mut cells = Vec::with_capacity(cell_count(&shape));
        for kept_idx in each_multi_index(&shape) {
            let full_idx = self.expand_index(&fixed, &kept_positions, &kept_idx);
            cells.push(self.cells[flat_index(&strides, &full_idx)].clone());
        }

        Ok(Reference { axis_names, shape, cells })
    }

    /// Write `value` into the sub-tensor addressed by `slice`, in place.
    /// `value`'s shape must equal the addressed sub-tensor's shape.
    ///
    /// In dev mode, an unknown axis name, an out-of-range index, or a shape
    /// mismatch raises. Otherwise the addressed cells are left as skip
    /// markers rather than written.
    pub fn tensor_write(&mut self, slice: &[(String, usize)], value: &Reference, dev_mode: bool) -> OrchestratorResult<()> {
        let (fixed, kept_positions) = match self.resolve_slice(slice, dev_mode)? {
            Ok(resolved) => resolved,
            Err(()) => return Ok(()),
        };

        let expected_shape: Vec<usize> = kept_positions.iter().map(|&p| self.shape[p]).collect();
        let strides = row_major_strides(&self.shape);

        if value.shape() != expected_shape.as_slice() {
            if dev_mode {
                return Err(OrchestratorError::AxisLengthMismatch {
                    axis: "tensor_write target".to_string(),
                    expected: cell_count(&expected_shape),
                    actual: value.cells().len(),
                });
            }
            for kept_idx in each_multi_index(&expected_shape) {
                let full_idx = self.expand_index(&fixed, &kept_positions, &kept_idx);
                let flat = flat_index(&strides, &full_idx);
                self.cells[flat] = Value::Skip;
            }
            return Ok(());
        }

        for (cell_pos, kept_idx) in each_multi_index(&expected_shape).into_iter().enumerate() {
            let full_idx = self.expand_index(&fixed, &kept_positions, &kept_idx);
            let flat = flat_index(&strides, &full_idx);
            self.cells[flat] = value.cells()[cell_pos].clone();
        }
        Ok(())
    }

    /// Keep only the positions along `axis` where `mask`'s corresponding
    /// cell is `Value::Bool(true)`. `mask` must be a rank-1 reference whose
    /// length equals `axis`'s extent.
    ///
    /// In dev mode, an unknown axis or a mismatched mask raises. Otherwise
    /// the result collapses to a single skip cell.
    pub fn filter(&self, axis: &str, mask: &Reference, dev_mode: bool) -> OrchestratorResult<Reference> {
        let Some(axis_pos) = self.axis_position(axis) else {
            return Self::fail_or_skip(dev_mode, || OrchestratorError::AxisNotFound(axis.to_string()));
        };
        let extent = self.shape[axis_pos];
        if mask.rank() > 1 || mask.cells.len() != extent {
            return Self::fail_or_skip(dev_mode, || OrchestratorError::AxisLengthMismatch {
                axis: axis.to_string(),
                expected: extent,
                actual: mask.cells.len(),
            });
        }

        let keep: Vec<usize> = (0..extent).filter(|&i| matches!(mask.cells[i], Value::Bool(true))).collect();

        let mut shape = self.shape.clone();
        shape[axis_pos] = keep.len();
        let strides = row_major_strides(&self.shape);

        let mut cells = Vec::with_capacity(cell_count(&shape));
        for idx in each_multi_index(&shape) {
            let mut full_idx = idx.clone();
            full_idx[axis_pos] = keep[idx[axis_pos]];
            cells.push(self.cells[flat_index(&strides, &full_idx)].clone());
        }

        Ok(Reference {
            axis_names: self.axis_names.clone(),
            shape,
            cells,
        })
    }

    /// Validate a `tensor_read`/`tensor_write` slice against this
    /// reference's axes, returning the fixed-position map and the list of
    /// axis positions left unfixed — or, outside dev mode, a skip signal
    /// the caller turns into its own skip-shaped result.
    #[allow(clippy::type_complexity)]
    fn resolve_slice(&self, slice: &[(String, usize)], dev_mode: bool) -> OrchestratorResult<Result<(HashMap<usize, usize>, Vec<usize>), ()>> {
        let mut fixed = HashMap::new();
        for (name, index) in slice {
            let pos = match self.axis_position(name) {
                Some(pos) => pos,
                None => {
                    if dev_mode {
                        return Err(OrchestratorError::AxisNotFound(name.clone()));
                    }
                    return Ok(Err(()));
                }
            };
            if *index >= self.shape[pos] {
                if dev_mode {
                    return Err(OrchestratorError::AxisLengthMismatch {
                        axis: name.clone(),
                        expected: self.shape[pos],
                        actual: *index,
                    });
                }
                return Ok(Err(()));
            }
            fixed.insert(pos, *index);
        }

        let kept_positions: Vec<usize> = (0..self.rank()).filter(|p| !fixed.contains_key(p)).collect();
        Ok(Ok((fixed, kept_positions)))
    }

    /// Rebuild a full index into `self`'s shape from a slice's fixed
    /// positions plus a multi-index over the kept (unfixed) positions.
    fn expand_index(&self, fixed: &HashMap<usize, usize>, kept_positions: &[usize], kept_idx: &[usize]) -> Vec<usize> {
        let mut full_idx = vec![0usize; self.rank()];
        for (&pos, &index) in fixed {
            full_idx[pos] = index;
        }
        for (k, &pos) in kept_positions.iter().enumerate() {
            full_idx[pos] = kept_idx[k];
        }
        full_idx
    }

    fn fail_or_skip(dev_mode: bool, err: impl FnOnce() -> OrchestratorError) -> OrchestratorResult<Reference> {
        if dev_mode { Err(err()) } else { Ok(Reference::skipped()) }
    }

    fn derive_shape(value: &Value, shape: &mut Vec<usize>) {
        if let Value::List(items) = value {
            shape.push(items.len());
            if let Some(first) = items.first() {
                Self::derive_shape(first, shape);
            }
        }
    }

    fn flatten(value: &Value, out: &mut Vec<Value>) {
        match value {
            Value::List(items) => {
                for item in items {
                    Self::flatten(item, out);
                }
            }
            other => out.push(other.clone()),
        }
    }
}

/// Row-major strides for `shape`: `strides[i]` is how many cells to skip
/// to advance `idx[i]` by one.
fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn flat_index(strides: &[usize], idx: &[usize]) -> usize {
    idx.iter().zip(strides).map(|(i, s)| i * s).sum()
}

fn cell_count(shape: &[usize]) -> usize {
    shape.iter().product::<usize>().max(1)
}

/// Every multi-index over `shape`, in row-major (odometer) order. A
/// zero-rank shape yields a single empty index.
fn each_multi_index(shape: &[usize]) -> Vec<Vec<usize>> {
    if shape.is_empty() {
        return vec![Vec::new()];
    }
    if shape.contains(&0) {
        return Vec::new();
    }

    let total: usize = shape.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut idx = vec![0usize; shape.len()];
    for _ in 0..total {
        out.push(idx.clone());
        for axis in (0..shape.len()).rev() {
            idx[axis] += 1;
            if idx[axis] < shape[axis] {
                break;
            }
            idx[axis] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_2x2() -> Value {
        Value::List(vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::List(vec![Value::Int(3), Value::Int(4)]),
        ])
    }

    #[test]
    fn derives_shape_from_nesting() {
        let reference = Reference::from_nested(nested_2x2(), None).unwrap();
        assert_eq!(reference.shape(), &[2, 2]);
        assert_eq!(reference.cells().len(), 4);
    }

    #[test]
    fn default_axis_names_are_positional() {
        let reference = Reference::from_nested(nested_2x2(), None).unwrap();
        assert_eq!(reference.axis_names(), &["axis0", "axis1"]);
    }

    #[test]
    fn custom_axis_names_are_kept() {
        let reference = Reference::from_nested(nested_2x2(), Some(vec!["row".into(), "col".into()])).unwrap();
        assert_eq!(reference.axis_names(), &["row", "col"]);
        assert_eq!(reference.axis_position("col"), Some(1));
    }

    #[test]
    fn duplicate_axis_names_are_rejected() {
        let err = Reference::from_nested(nested_2x2(), Some(vec!["row".into(), "row".into()])).unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateAxis(_)));
    }

    #[test]
    fn scalar_reference_has_zero_rank() {
        let reference = Reference::scalar(Value::Int(42));
        assert_eq!(reference.rank(), 0);
        assert_eq!(reference.cells(), &[Value::Int(42)]);
    }

    #[test]
    fn skipped_reference_is_all_skip() {
        let reference = Reference::skipped();
        assert!(reference.is_skip());
    }

    #[test]
    fn scalar_value_is_not_skip() {
        let reference = Reference::scalar(Value::Bool(true));
        assert!(!reference.is_skip());
    }

    #[test]
    fn from_untagged_json_converts_plain_scalars_and_lists() {
        assert_eq!(Value::from_untagged_json(serde_json::json!(42)).unwrap(), Value::Int(42));
        assert_eq!(Value::from_untagged_json(serde_json::json!("hi")).unwrap(), Value::Text("hi".to_string()));
        assert_eq!(
            Value::from_untagged_json(serde_json::json!([1, 2])).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn from_untagged_json_rejects_objects() {
        assert!(Value::from_untagged_json(serde_json::json!({"a": 1})).is_err());
    }

    fn rows(data: Vec<Vec<i64>>, axes: [&str; 2]) -> Reference {
        let nested = Value::List(data.into_iter().map(|row| Value::List(row.into_iter().map(Value::Int).collect())).collect());
        Reference::from_nested(nested, Some(vec![axes[0].to_string(), axes[1].to_string()])).unwrap()
    }

    fn vector(data: Vec<i64>, axis: &str) -> Reference {
        Reference::from_nested(Value::List(data.into_iter().map(Value::Int).collect()), Some(vec![axis.to_string()])).unwrap()
    }

    #[test]
    fn cross_product_aligns_shared_axis_and_outer_products_disjoint_axes() {
        let left = vector(vec![1, 2], "i");
        let right = rows(vec![vec![10, 11], vec![20, 21]], ["i", "j"]);
        let result = left.cross_product(&right, true).unwrap();
        assert_eq!(result.axis_names(), &["i", "j"]);
        assert_eq!(result.shape(), &[2, 2]);
        assert_eq!(result.cells()[0], Value::List(vec![Value::Int(1), Value::Int(10)]));
        assert_eq!(result.cells()[3], Value::List(vec![Value::Int(2), Value::Int(21)]));
    }

    #[test]
    fn cross_product_disjoint_axes_take_outer_product() {
        let left = vector(vec![1, 2], "i");
        let right = vector(vec![100, 200], "j");
        let result = left.cross_product(&right, true).unwrap();
        assert_eq!(result.axis_names(), &["i", "j"]);
        assert_eq!(result.shape(), &[2, 2]);
        assert_eq!(result.cells()[1], Value::List(vec![Value::Int(1), Value::Int(200)]));
        assert_eq!(result.cells()[2], Value::List(vec![Value::Int(2), Value::Int(100)]));
    }

    #[test]
    fn cross_product_shared_axis_mismatch_raises_in_dev_mode() {
        let left = vector(vec![1, 2], "i");
        let right = vector(vec![1, 2, 3], "i");
        let err = left.cross_product(&right, true).unwrap_err();
        assert!(matches!(err, OrchestratorError::AxisLengthMismatch { .. }));
    }

    #[test]
    fn cross_product_shared_axis_mismatch_skips_outside_dev_mode() {
        let left = vector(vec![1, 2], "i");
        let right = vector(vec![1, 2, 3], "i");
        let result = left.cross_product(&right, false).unwrap();
        assert!(result.is_skip());
    }

    #[test]
    fn tensor_read_fixes_named_axis_and_keeps_the_rest() {
        let grid = rows(vec![vec![1, 2], vec![3, 4]], ["row", "col"]);
        let result = grid.tensor_read(&[("row".to_string(), 1)], true).unwrap();
        assert_eq!(result.axis_names(), &["col"]);
        assert_eq!(result.cells(), &[Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn tensor_read_unknown_axis_raises_in_dev_mode() {
        let grid = rows(vec![vec![1, 2], vec![3, 4]], ["row", "col"]);
        let err = grid.tensor_read(&[("depth".to_string(), 0)], true).unwrap_err();
        assert!(matches!(err, OrchestratorError::AxisNotFound(_)));
    }

    #[test]
    fn tensor_read_unknown_axis_skips_outside_dev_mode() {
        let grid = rows(vec![vec![1, 2], vec![3, 4]], ["row", "col"]);
        let result = grid.tensor_read(&[("depth".to_string(), 0)], false).unwrap();
        assert!(result.is_skip());
    }

    #[test]
    fn tensor_write_overwrites_addressed_slice_in_place() {
        let mut grid = rows(vec![vec![1, 2], vec![3, 4]], ["row", "col"]);
        let new_row = vector(vec![9, 8], "col");
        grid.tensor_write(&[("row".to_string(), 0)], &new_row, true).unwrap();
        assert_eq!(grid.cells(), &[Value::Int(9), Value::Int(8), Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn tensor_write_shape_mismatch_raises_in_dev_mode() {
        let mut grid = rows(vec![vec![1, 2], vec![3, 4]], ["row", "col"]);
        let wrong_shape = vector(vec![9, 8, 7], "col");
        let err = grid.tensor_write(&[("row".to_string(), 0)], &wrong_shape, true).unwrap_err();
        assert!(matches!(err, OrchestratorError::AxisLengthMismatch { .. }));
    }

    #[test]
    fn tensor_write_shape_mismatch_marks_skip_outside_dev_mode() {
        let mut grid = rows(vec![vec![1, 2], vec![3, 4]], ["row", "col"]);
        let wrong_shape = vector(vec![9, 8, 7], "col");
        grid.tensor_write(&[("row".to_string(), 0)], &wrong_shape, false).unwrap();
        assert_eq!(grid.cells(), &[Value::Skip, Value::Skip, Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn filter_keeps_only_masked_positions_along_axis() {
        let grid = rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]], ["row", "col"]);
        let mask = Reference::from_nested(
            Value::List(vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]),
            Some(vec!["row".to_string()]),
        )
        .unwrap();
        let result = grid.filter("row", &mask, true).unwrap();
        assert_eq!(result.shape(), &[2, 2]);
        assert_eq!(result.cells(), &[Value::Int(1), Value::Int(2), Value::Int(5), Value::Int(6)]);
    }

    #[test]
    fn filter_mask_length_mismatch_raises_in_dev_mode() {
        let grid = vector(vec![1, 2, 3], "i");
        let short_mask = Reference::from_nested(Value::List(vec![Value::Bool(true)]), Some(vec!["i".to_string()])).unwrap();
        let err = grid.filter("i", &short_mask, true).unwrap_err();
        assert!(matches!(err, OrchestratorError::AxisLengthMismatch { .. }));
    }

    #[test]
    fn filter_mask_length_mismatch_skips_outside_dev_mode() {
        let grid = vector(vec![1, 2, 3], "i");
        let short_mask = Reference::from_nested(Value::List(vec![Value::Bool(true)]), Some(vec!["i".to_string()])).unwrap();
        let result = grid.filter("i", &short_mask, false).unwrap();
        assert!(result.is_skip());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        /// Build a rectangular nested `Value::List` of the given shape,
        /// filling cells from a flat counter so distinct cells are
        /// distinguishable.
        fn build_nested(shape: &[usize], next: &mut i64) -> Value {
            match shape.split_first() {
                None => {
                    let v = Value::Int(*next);
                    *next += 1;
                    v
                }
                Some((&dim, rest)) => Value::List((0..dim).map(|_| build_nested(rest, next)).collect()),
            }
        }

        fn arb_shape() -> impl Strategy<Value = Vec<usize>> {
            prop::collection::vec(1usize..=4, 0..=3)
        }

        proptest! {
            /// Shape derivation is exactly the extent of each nesting level,
            /// and the cell count always equals the shape's product —
            /// regardless of what dimensions the shape happens to hold.
            #[test]
            fn shape_matches_nesting_extent(shape in arb_shape()) {
                let mut counter = 0;
                let data = build_nested(&shape, &mut counter);
                let reference = Reference::from_nested(data, None).unwrap();
                prop_assert_eq!(reference.shape(), shape.as_slice());
                let expected_cells: usize = shape.iter().product::<usize>().max(1);
                prop_assert_eq!(reference.cells().len(), expected_cells);
            }

            /// Building the same nested data twice is deterministic: same
            /// shape, same axis names, same flattened cell order.
            #[test]
            fn from_nested_is_deterministic(shape in arb_shape()) {
                let mut counter = 0;
                let data = build_nested(&shape, &mut counter);
                let a = Reference::from_nested(data.clone(), None).unwrap();
                let b = Reference::from_nested(data, None).unwrap();
                prop_assert_eq!(a, b);
            }

            /// Renaming axes doesn't touch shape or cell order — axis names
            /// are a label layered over the same underlying extent.
            #[test]
            fn axis_renaming_is_independent_of_shape(shape in arb_shape()) {
                let mut counter = 0;
                let data = build_nested(&shape, &mut counter);
                let rank = shape.len();
                let default_names: Reference = Reference::from_nested(data.clone(), None).unwrap();
                let custom_names: Vec<String> = (0..rank).map(|i| format!("custom{i}")).collect();
                let renamed = Reference::from_nested(data, Some(custom_names)).unwrap();
                prop_assert_eq!(default_names.shape(), renamed.shape());
                prop_assert_eq!(default_names.cells(), renamed.cells());
            }
        }
    }
}
