/// Linear axis with "nice number" ticks and data→pixel mapping.
#[derive(Debug, Clone)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub tick_positions: Vec<f64>,
    pub tick_labels: Vec<String>,
}

impl Axis {
    /// Auto-scale to cover `[data_min, data_max]` with roughly `target_ticks` ticks.
    pub fn auto_linear(data_min: f64, data_max: f64, target_ticks: usize) -> Self {
        let (nice_min, nice_max, step) = nice_range(data_min, data_max, target_ticks);
        let n = ((nice_max - nice_min) / step).round() as usize;
        let tick_positions: Vec<f64> = (0..=n).map(|i| nice_min + i as f64 * step).collect();
        let tick_labels = tick_positions.iter().map(|&v| format_tick(v, step)).collect();
        Self { min: nice_min, max: nice_max, tick_positions, tick_labels }
    }

    /// Explicit limits, ticks as for [`Axis::auto_linear`] but clipped to the limits.
    pub fn fixed(min: f64, max: f64, target_ticks: usize) -> Self {
        let auto = Self::auto_linear(min, max, target_ticks);
        let tol = (max - min).abs() * 1e-9;
        let (tick_positions, tick_labels) = auto
            .tick_positions
            .into_iter()
            .zip(auto.tick_labels)
            .filter(|(t, _)| *t >= min - tol && *t <= max + tol)
            .unzip();
        Self { min, max, tick_positions, tick_labels }
    }

    /// Map a data value to a pixel coordinate.
    pub fn data_to_pixel(&self, value: f64, px_min: f64, px_max: f64) -> f64 {
        let frac = (value - self.min) / (self.max - self.min);
        px_min + frac * (px_max - px_min)
    }
}

/// Enclosing range snapped to multiples of a nice step: `(min, max, step)`.
pub fn nice_range(data_min: f64, data_max: f64, target_ticks: usize) -> (f64, f64, f64) {
    if (data_max - data_min).abs() < 1e-15 {
        return (data_min - 1.0, data_max + 1.0, 1.0);
    }
    let range = data_max - data_min;
    let rough_step = range / (target_ticks.max(2) - 1) as f64;
    let step = nice_step(rough_step);
    let nice_min = (data_min / step).floor() * step;
    let nice_max = (data_max / step).ceil() * step;
    (nice_min, nice_max, step)
}

/// Round `rough` to 1, 2, 5 or 10 times a power of ten.
pub fn nice_step(rough: f64) -> f64 {
    let exp = rough.abs().log10().floor();
    let frac = rough / 10.0_f64.powf(exp);
    let nice_frac = if frac <= 1.5 {
        1.0
    } else if frac <= 3.5 {
        2.0
    } else if frac <= 7.5 {
        5.0
    } else {
        10.0
    };
    nice_frac * 10.0_f64.powf(exp)
}

/// Tick label with as many decimals as the step needs.
pub fn format_tick(value: f64, step: f64) -> String {
    // avoid "-0"
    let v = if value.abs() < step * 0.01 { 0.0 } else { value };
    if step >= 1.0 {
        format!("{}", v.round() as i64)
    } else {
        let decimals = (-step.log10().floor()) as usize;
        format!("{:.prec$}", v, prec = decimals)
    }
}
