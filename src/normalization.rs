//! Normalization and moments, forwarded to the engine.
//!
//! Each series is one column: the first dimension runs along the series,
//! the remaining dimensions index independent series.

use engine_sys::OpCode;

use crate::{call, Array, ProtocolError, Result};

/// Standard deviations at or below this are treated as flat.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Z-normalize every series: subtract the mean, divide by the population
/// standard deviation. Flat series are only centered.
pub fn znorm(array: &Array, epsilon: f64) -> Result<Array> {
    let mut results = call(OpCode::ZNorm { epsilon }, &[array])?;
    results.pop().ok_or_else(|| {
        ProtocolError::IdentifierCount {
            op: "znorm",
            expected: 1,
            found: 0,
        }
        .into()
    })
}

/// [`znorm`] written into `array`'s own storage.
pub fn znorm_in_place(array: &mut Array, epsilon: f64) -> Result<()> {
    call(OpCode::ZNormInPlace { epsilon }, &[&*array])?;
    Ok(())
}

/// Per-series mean and population standard deviation, each shaped
/// `[1, d1, d2, d3]`.
pub fn mean_stdev(array: &Array) -> Result<(Array, Array)> {
    let results = call(OpCode::MeanStdev, &[array])?;
    let [mean, stdev]: [Array; 2] = results.try_into().map_err(|rest: Vec<Array>| {
        ProtocolError::IdentifierCount {
            op: "mean_stdev",
            expected: 2,
            found: rest.len(),
        }
    })?;
    Ok((mean, stdev))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineContext;
    use approx::assert_relative_eq;
    use engine_sys::HostEngine;

    #[test]
    fn test_znorm_unit_variance() {
        let ctx = EngineContext::new(HostEngine::new()).unwrap();
        let a = Array::from_slice(&ctx, &[2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], &[8]).unwrap();
        let z = znorm(&a, DEFAULT_EPSILON).unwrap().to_vec::<f64>().unwrap();
        let mean = z.iter().sum::<f64>() / 8.0;
        let var = z.iter().map(|v| v * v).sum::<f64>() / 8.0;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        assert_relative_eq!(z[0], -1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_stdev_shapes() {
        let ctx = EngineContext::new(HostEngine::new()).unwrap();
        let a = Array::from_slice(&ctx, &[1.0f32, 3.0, 10.0, 10.0], &[2, 2]).unwrap();
        let (mean, stdev) = mean_stdev(&a).unwrap();
        assert_eq!(mean.shape().unwrap().dims(), [1, 2, 1, 1]);
        assert_eq!(mean.to_vec::<f32>().unwrap(), vec![2.0, 10.0]);
        assert_eq!(stdev.to_vec::<f32>().unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_znorm_rejects_integers() {
        let ctx = EngineContext::new(HostEngine::new()).unwrap();
        let a = Array::from_slice(&ctx, &[1i32, 2], &[2]).unwrap();
        assert!(znorm(&a, DEFAULT_EPSILON).is_err());
    }
}
