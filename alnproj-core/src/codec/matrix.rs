//! Dense matrix encoding for PCA results

use crate::document::{DoubleMatrixDoc, DoubleVectorDoc};
use crate::error::{ArchiveError, ArchiveResult};
use crate::model::Matrix;

pub fn encode_matrix(matrix: &Matrix) -> DoubleMatrixDoc {
    DoubleMatrixDoc {
        rows: matrix.height(),
        columns: matrix.width(),
        row: matrix
            .rows
            .iter()
            .map(|r| DoubleVectorDoc { values: r.clone() })
            .collect(),
        d: matrix.d.as_ref().map(|d| DoubleVectorDoc { values: d.clone() }),
        e: matrix.e.as_ref().map(|e| DoubleVectorDoc { values: e.clone() }),
    }
}

pub fn decode_matrix(doc: &DoubleMatrixDoc) -> ArchiveResult<Matrix> {
    if doc.row.len() != doc.rows {
        return Err(ArchiveError::document(
            "matrix",
            format!("declares {} rows but holds {}", doc.rows, doc.row.len()),
        ));
    }
    if let Some(bad) = doc.row.iter().position(|r| r.values.len() != doc.columns) {
        return Err(ArchiveError::document(
            "matrix",
            format!("row {} does not have {} columns", bad, doc.columns),
        ));
    }
    Ok(Matrix {
        rows: doc.row.iter().map(|r| r.values.clone()).collect(),
        d: doc.d.as_ref().map(|v| v.values.clone()),
        e: doc.e.as_ref().map(|v| v.values.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn through_xml(matrix: &Matrix) -> Matrix {
        let xml = quick_xml::se::to_string(&encode_matrix(matrix)).expect("serialize");
        let doc: DoubleMatrixDoc = quick_xml::de::from_str(&xml).expect("parse");
        decode_matrix(&doc).expect("decode")
    }

    #[test]
    fn test_awkward_doubles_survive_text() {
        let mut m = Matrix::new(vec![vec![0.1 + 0.2, 5e-324, -1.7976931348623157e308], vec![1.0 / 3.0, -0.0, 2.5]]);
        m.d = Some(vec![std::f64::consts::PI, 1e-300]);
        m.e = Some(vec![0.0]);
        let back = through_xml(&m);
        assert_eq!(back, m);
        assert_eq!(back.rows[0][0].to_bits(), (0.1f64 + 0.2).to_bits());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let mut doc = encode_matrix(&Matrix::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]));
        doc.row[1].values.pop();
        assert!(decode_matrix(&doc).is_err());
    }

    proptest! {
        #[test]
        fn prop_values_round_trip_bit_exact(
            values in prop::collection::vec(prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO, 1..12),
            width in 1usize..4,
        ) {
            let rows: Vec<Vec<f64>> = values.chunks(width).filter(|c| c.len() == width).map(|c| c.to_vec()).collect();
            prop_assume!(!rows.is_empty());
            let m = Matrix { rows, d: Some(values.clone()), e: None };
            let back = through_xml(&m);
            for (a, b) in back.rows.iter().flatten().zip(m.rows.iter().flatten()) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
            prop_assert_eq!(back.d, m.d);
        }
    }
}
