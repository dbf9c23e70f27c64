use crate::error::{PredictError, ShapeError};
use ndarray::Array2;
use serde_json::Value;

/// Turns the `"data"` value of a request into a `(rows, width)` batch.
///
/// A rank-2 array whose inner dimension is `width` keeps its rows. Anything
/// else is flattened row-major and cut into rows of `width`, which fails when
/// the element count is not a multiple of `width`.
pub fn to_batch(data: Option<&Value>, width: usize) -> Result<Array2<f32>, PredictError> {
    let data = match data {
        Some(value) if !is_empty(value) => value,
        _ => return Err(PredictError::missing_data()),
    };

    let shape = infer_shape(data);
    let mut values = Vec::new();
    flatten(data, &shape, 0, &mut values)?;

    let size = values.len();
    let rows = if shape.len() == 2 && shape[1] == width {
        shape[0]
    } else {
        if size % width != 0 {
            return Err(ShapeError::Reshape { size, width }.into());
        }
        tracing::debug!("Reshaping input of shape {:?} into rows of {}", shape, width);
        size / width
    };

    if rows == 0 {
        return Err(ShapeError::EmptyBatch.into());
    }

    Array2::from_shape_vec((rows, width), values)
        .map_err(|_| PredictError::Shape(ShapeError::Reshape { size, width }))
}

/// `null`, `false`, `0`, `""`, `[]` and `{}` count as no data at all.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Dimensions along the first element of every nesting level.
fn infer_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(items) = current {
        shape.push(items.len());
        match items.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

fn flatten(
    value: &Value,
    shape: &[usize],
    depth: usize,
    out: &mut Vec<f32>,
) -> Result<(), PredictError> {
    match (value, shape.get(depth)) {
        (Value::Array(items), Some(&len)) if items.len() == len => items
            .iter()
            .try_for_each(|item| flatten(item, shape, depth + 1, out)),
        (Value::Array(_), _) | (_, Some(_)) => Err(ShapeError::Ragged { depth }.into()),
        (scalar, None) => {
            out.push(to_f32(scalar)?);
            Ok(())
        }
    }
}

/// Numbers, booleans and numeric strings convert; `null` becomes NaN.
fn to_f32(value: &Value) -> Result<f32, PredictError> {
    let not_a_float = || PredictError::InvalidRequest(format!("could not convert {} to float", value));
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32).ok_or_else(not_a_float),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f32>().map_err(|_| not_a_float()),
        Value::Null => Ok(f32::NAN),
        Value::Array(_) | Value::Object(_) => Err(not_a_float()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WIDTH: usize = 300;

    fn vector(len: usize, value: f32) -> Value {
        json!(vec![value; len])
    }

    #[test]
    fn test_flat_vector_becomes_single_row() {
        let data = Value::Array((0..WIDTH).map(|i| json!(i as f32)).collect());
        let batch = to_batch(Some(&data), WIDTH).unwrap();

        assert_eq!(batch.shape(), &[1, WIDTH]);
        assert_eq!(batch[[0, 0]], 0.0);
        assert_eq!(batch[[0, 299]], 299.0);
    }

    #[test]
    fn test_matrix_rows_are_kept() {
        let data = json!([vec![0.5f32; WIDTH], vec![1.5f32; WIDTH]]);
        let batch = to_batch(Some(&data), WIDTH).unwrap();

        assert_eq!(batch.shape(), &[2, WIDTH]);
        assert_eq!(batch[[0, 10]], 0.5);
        assert_eq!(batch[[1, 10]], 1.5);
    }

    #[test]
    fn test_other_shapes_are_reshaped() {
        let flat = vector(2 * WIDTH, 0.25);
        assert_eq!(to_batch(Some(&flat), WIDTH).unwrap().shape(), &[2, WIDTH]);

        let cube = json!([[vec![1.0f32; WIDTH], vec![2.0f32; WIDTH]]]);
        let batch = to_batch(Some(&cube), WIDTH).unwrap();
        assert_eq!(batch.shape(), &[2, WIDTH]);
        assert_eq!(batch[[1, 0]], 2.0);

        let columns = json!(vec![vec![3.0f32; 2]; 150]);
        assert_eq!(to_batch(Some(&columns), WIDTH).unwrap().shape(), &[1, WIDTH]);
    }

    #[test]
    fn test_missing_or_empty_data() {
        for data in [
            None,
            Some(json!(null)),
            Some(json!([])),
            Some(json!(0)),
            Some(json!(false)),
            Some(json!("")),
            Some(json!({})),
        ] {
            let err = to_batch(data.as_ref(), WIDTH).unwrap_err();
            assert!(matches!(err, PredictError::InvalidRequest(_)));
            assert_eq!(err.to_string(), "Missing 'data' field");
        }
    }

    #[test]
    fn test_size_not_divisible_by_width() {
        let data = vector(WIDTH - 1, 1.0);
        let err = to_batch(Some(&data), WIDTH).unwrap_err();

        assert!(matches!(
            err,
            PredictError::Shape(ShapeError::Reshape {
                size: 299,
                width: 300
            })
        ));
        assert!(err.to_string().contains("reshape"));
    }

    #[test]
    fn test_scalar_cannot_be_reshaped() {
        let err = to_batch(Some(&json!(5)), WIDTH).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Shape(ShapeError::Reshape { size: 1, .. })
        ));
    }

    #[test]
    fn test_ragged_rows() {
        let data = json!([vec![1.0f32; WIDTH], vec![1.0f32; WIDTH - 1]]);
        let err = to_batch(Some(&data), WIDTH).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Shape(ShapeError::Ragged { depth: 1 })
        ));

        let mixed = json!([[1.0, 2.0], 3.0]);
        assert!(matches!(
            to_batch(Some(&mixed), WIDTH).unwrap_err(),
            PredictError::Shape(ShapeError::Ragged { .. })
        ));
    }

    #[test]
    fn test_non_numeric_elements() {
        let mut items = vec![json!(1.0); WIDTH];
        items[7] = json!("abc");
        let err = to_batch(Some(&Value::Array(items)), WIDTH).unwrap_err();

        assert!(matches!(err, PredictError::InvalidRequest(_)));
        assert!(err.to_string().contains("could not convert \"abc\""));

        let mut items = vec![json!(1.0); WIDTH];
        items[0] = json!({"x": 1});
        let err = to_batch(Some(&Value::Array(items)), WIDTH).unwrap_err();
        assert!(matches!(err, PredictError::InvalidRequest(_)));
    }

    #[test]
    fn test_numeric_strings_are_parsed() {
        let data = json!(vec!["0.5"; WIDTH]);
        let batch = to_batch(Some(&data), WIDTH).unwrap();
        assert_eq!(batch.shape(), &[1, WIDTH]);
        assert_eq!(batch[[0, 0]], 0.5);

        let mut items = vec![json!(0.0); WIDTH];
        items[3] = json!(" -2.25 ");
        let batch = to_batch(Some(&Value::Array(items)), WIDTH).unwrap();
        assert_eq!(batch[[0, 3]], -2.25);
    }

    #[test]
    fn test_null_elements_become_nan() {
        let mut items = vec![json!(1.0); WIDTH];
        items[42] = Value::Null;
        let batch = to_batch(Some(&Value::Array(items)), WIDTH).unwrap();

        assert!(batch[[0, 42]].is_nan());
        assert_eq!(batch[[0, 41]], 1.0);
    }

    #[test]
    fn test_booleans_are_numeric() {
        let mut items = vec![json!(0.0); WIDTH];
        items[0] = json!(true);
        let batch = to_batch(Some(&Value::Array(items)), WIDTH).unwrap();

        assert_eq!(batch[[0, 0]], 1.0);
    }

    #[test]
    fn test_empty_rows() {
        let err = to_batch(Some(&json!([[]])), WIDTH).unwrap_err();
        assert!(matches!(err, PredictError::Shape(ShapeError::EmptyBatch)));
    }
}
