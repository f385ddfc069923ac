pub mod fdp;
pub mod median;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`fdp::SpringEmbedder`].
///
/// Fields left at `0.0` (`t0`, `cell_size`) are derived from the graph on the first run and then
/// kept for later runs until [`fdp::SpringEmbedder::reset_tuning`] is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Number of cooling iterations per `process` call. There is no early exit.
    pub num_iters: usize,
    /// Bound repulsion to neighbouring grid cells. When false every node pair is evaluated.
    pub use_grid: bool,
    /// Component-wise layout. Not implemented: the whole graph is laid out as one component.
    pub use_comp: bool,
    /// Nominal drawing width. Informational only.
    pub width: f64,
    /// Nominal drawing height. Informational only.
    pub height: f64,
    /// Initial temperature (maximum step length of the first iteration). `<= 0` derives it.
    pub t0: f64,
    pub rep_factor: f64,
    pub att_factor: f64,
    /// Grid cell edge length. `<= 0` derives it as three ideal edge lengths.
    pub cell_size: f64,
    /// Seed for the jitter used to separate coincident nodes.
    pub random_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_iters: 40,
            use_grid: true,
            use_comp: false,
            width: 0.0,
            height: 0.0,
            t0: 0.0,
            rep_factor: 1.0,
            att_factor: 1.0,
            cell_size: 0.0,
            random_seed: 1,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.num_iters == 0 {
            return Err(Error::InvalidConfig {
                field: "num_iters",
                value: "0".to_string(),
            });
        }
        let finite = [
            ("width", self.width),
            ("height", self.height),
            ("t0", self.t0),
            ("rep_factor", self.rep_factor),
            ("att_factor", self.att_factor),
            ("cell_size", self.cell_size),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(Error::InvalidConfig {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::error::Error;

    #[test]
    fn defaults_match_the_classic_fdp_setup() {
        let c = Config::default();
        assert_eq!(c.num_iters, 40);
        assert!(c.use_grid);
        assert!(!c.use_comp);
        assert_eq!(c.rep_factor, 1.0);
        assert_eq!(c.att_factor, 1.0);
        assert_eq!(c.t0, 0.0);
        assert_eq!(c.cell_size, 0.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_iterations_and_nan() {
        let c = Config {
            num_iters: 0,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(Error::InvalidConfig {
                field: "num_iters",
                ..
            })
        ));

        let c = Config {
            rep_factor: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(Error::InvalidConfig {
                field: "rep_factor",
                ..
            })
        ));
    }
}
