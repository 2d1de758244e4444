/// Voltage table generation
///
/// A voltage setting is a space-separated list of step indices, one per rail.
/// Each step maps to millivolts via `step * 12.5 + 600`. For every rail the
/// editor offers a small window of steps around the current one, clamped to
/// whatever limits the device reports.
use crate::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};

/// Millivolts added to every step
pub const BASE_MILLIVOLTS: f64 = 600.0;
/// Millivolts per step
pub const MILLIVOLTS_PER_STEP: f64 = 12.5;
/// Steps offered on either side of the current one
pub const WINDOW_RADIUS: i32 = 2;

/// Device-reported step limits, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltageBounds {
    pub min: i32,
    pub max: i32,
}

impl VoltageBounds {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

/// One selectable entry in a rail's choice list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageChoice {
    pub label: String,
    pub step: i32,
}

impl VoltageChoice {
    pub fn millivolts(&self) -> f64 {
        step_to_millivolts(self.step)
    }
}

/// Exact for integer steps: 12.5 is representable in binary
pub fn step_to_millivolts(step: i32) -> f64 {
    f64::from(step) * MILLIVOLTS_PER_STEP + BASE_MILLIVOLTS
}

pub fn format_millivolts(step: i32) -> String {
    format!("{} mV", step_to_millivolts(step))
}

/// Choices for one rail, highest voltage first.
///
/// Returns an empty list when the bounds are inverted or the clamped window
/// is empty.
pub fn generate(current_step: i32, bounds: Option<VoltageBounds>) -> Vec<VoltageChoice> {
    let mut low = current_step.saturating_sub(WINDOW_RADIUS);
    let mut high = current_step.saturating_add(WINDOW_RADIUS);

    if let Some(bounds) = bounds {
        if bounds.max < bounds.min {
            return Vec::new();
        }
        low = low.max(bounds.min);
        high = high.min(bounds.max);
    }

    (low..=high)
        .rev()
        .map(|step| VoltageChoice {
            label: format_millivolts(step),
            step,
        })
        .collect()
}

/// A labelled rail and its current step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rail {
    pub label: String,
    pub step: i32,
}

/// Everything the voltage editor needs for one setting
#[derive(Debug, Clone)]
pub struct VoltageSpec {
    pub rails: Vec<Rail>,
    pub bounds: Option<VoltageBounds>,
}

impl VoltageSpec {
    /// Pair the steps in `value` with `labels`.
    ///
    /// Extra tokens without a label are named by position; labels without a
    /// token are dropped.
    pub fn parse(
        value: &str,
        labels: &[&str],
        bounds: Option<VoltageBounds>,
    ) -> TuneResult<Self> {
        let steps = parse_steps(value)?;
        let rails = steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| Rail {
                label: labels
                    .get(i)
                    .map(|l| (*l).to_string())
                    .unwrap_or_else(|| format!("Rail {}", i)),
                step,
            })
            .collect();

        Ok(Self { rails, bounds })
    }

    /// One choice list per rail, in rail order
    pub fn tables(&self) -> Vec<(String, Vec<VoltageChoice>)> {
        self.rails
            .iter()
            .map(|rail| (rail.label.clone(), generate(rail.step, self.bounds)))
            .collect()
    }

    /// Current steps joined back into a setting value
    pub fn render(&self) -> String {
        render_steps(self.rails.iter().map(|r| r.step))
    }

    /// Change the step on one rail
    pub fn select(&mut self, rail: usize, step: i32) -> TuneResult<()> {
        let count = self.rails.len();
        let entry = self.rails.get_mut(rail).ok_or_else(|| {
            TuneError::InvalidVoltage(format!("rail {} out of range ({} rails)", rail, count))
        })?;
        entry.step = step;
        Ok(())
    }
}

/// Split a voltage string into integer steps
pub fn parse_steps(value: &str) -> TuneResult<Vec<i32>> {
    value
        .split_whitespace()
        .map(|token| {
            token
                .parse::<i32>()
                .map_err(|_| TuneError::InvalidVoltage(format!("not a step index: {:?}", token)))
        })
        .collect()
}

pub fn render_steps(steps: impl IntoIterator<Item = i32>) -> String {
    steps
        .into_iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(choices: &[VoltageChoice]) -> Vec<i32> {
        choices.iter().map(|c| c.step).collect()
    }

    #[test]
    fn test_unbounded_window() {
        let choices = generate(10, None);
        assert_eq!(steps(&choices), vec![12, 11, 10, 9, 8]);

        let mv: Vec<f64> = choices.iter().map(|c| c.millivolts()).collect();
        assert_eq!(mv, vec![750.0, 737.5, 725.0, 712.5, 700.0]);
        assert_eq!(choices[1].label, "737.5 mV");
        assert_eq!(choices[0].label, "750 mV");
    }

    #[test]
    fn test_bounds_clamp_window() {
        let choices = generate(10, Some(VoltageBounds::new(9, 11)));
        assert_eq!(steps(&choices), vec![11, 10, 9]);
    }

    #[test]
    fn test_bounds_clamp_one_side() {
        let choices = generate(1, Some(VoltageBounds::new(0, 50)));
        assert_eq!(steps(&choices), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_inverted_bounds_empty() {
        assert!(generate(10, Some(VoltageBounds::new(15, 5))).is_empty());
    }

    #[test]
    fn test_current_outside_bounds_empty() {
        // Window 20..=24 lies entirely above max
        assert!(generate(22, Some(VoltageBounds::new(0, 10))).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let bounds = Some(VoltageBounds::new(5, 40));
        assert_eq!(generate(7, bounds), generate(7, bounds));
    }

    #[test]
    fn test_spec_tables_per_rail() {
        let spec = VoltageSpec::parse("38 40 42", &["125 MHz", "250 MHz", "500 MHz"], None).unwrap();
        let tables = spec.tables();

        assert_eq!(tables.len(), 3);
        assert_eq!(tables[0].0, "125 MHz");
        assert_eq!(steps(&tables[2].1), vec![44, 43, 42, 41, 40]);
    }

    #[test]
    fn test_spec_select_and_render() {
        let mut spec = VoltageSpec::parse("38  40", &["low"], None).unwrap();
        assert_eq!(spec.rails[1].label, "Rail 1");

        spec.select(1, 39).unwrap();
        assert_eq!(spec.render(), "38 39");
        assert!(spec.select(5, 1).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_steps("38 x"), Err(TuneError::InvalidVoltage(_))));
        assert!(parse_steps("").unwrap().is_empty());
    }
}
