use crate::ops::{DensityQuantifier, ResultsTable};
use twombli_core::OperationError;

/// High-density-matrix score: the fraction of heat-map pixels that are not
/// black.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlackSpaceDensity;

impl DensityQuantifier for BlackSpaceDensity {
    fn quantify(
        &self,
        heat_map: &[u8],
        w: usize,
        h: usize,
    ) -> Result<ResultsTable, OperationError> {
        let total = w * h;
        if total == 0 || heat_map.len() != total {
            return Err(OperationError::new(
                "density quantification",
                format!("heat-map holds {} pixels, expected {w}x{h}", heat_map.len()),
            ));
        }
        let black = heat_map.iter().filter(|&&v| v == 0).count();
        let hdm = 1.0 - black as f64 / total as f64;

        let mut table = ResultsTable::new(" ,Black Pixels,Total Pixels,HDM");
        table.push(format!("1,{black},{total},{hdm}"));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdm_is_last_field() {
        let t = BlackSpaceDensity.quantify(&[0, 0, 0, 255], 2, 2).unwrap();
        assert_eq!(t.last_field(), Some("0.25"));
        assert_eq!(t.last_row(), Some("1,3,4,0.25"));
    }

    #[test]
    fn empty_plane_is_an_error() {
        assert!(BlackSpaceDensity.quantify(&[], 0, 0).is_err());
    }
}
