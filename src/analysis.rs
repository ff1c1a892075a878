
// Spectral summary of captured traces

use rustfft::FFTplanner;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use serde::{Serialize, Deserialize};

use crate::devices::tds::Trace;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourierPeak {
	/// Hz
	pub frequency: f64,
	/// Single-sided amplitude, same units as the samples
	pub amplitude: f64,
}

/// Strongest non-DC component below Nyquist. The mean is removed first so an
/// offset doesn't leak into the low bins.
pub fn fourier_peak(samples:&[f64], sample_rate:f64) -> Option<FourierPeak> {
	let n = samples.len();
	if n < 2 || !(sample_rate > 0.0) {
		return None;
	}

	let mean:f64 = samples.iter().sum::<f64>() / (n as f64);
	let mut time_domain:Vec<Complex<f64>> = samples.iter().map(|x| Complex{ re: *x - mean, im: 0.0 }).collect();
	let mut freq_domain:Vec<Complex<f64>> = vec![Complex::zero(); n];

	let mut planner = FFTplanner::new(false);
	let fft = planner.plan_fft(n);
	fft.process(&mut time_domain, &mut freq_domain);

	let mut best_idx:usize = 0;
	let mut best_norm:f64 = 0.0;
	for (idx, c) in freq_domain.iter().enumerate().take(n/2 + 1).skip(1) {
		if c.norm() > best_norm {
			best_norm = c.norm();
			best_idx = idx;
		}
	}

	if best_idx == 0 {
		return None;
	}

	// The Nyquist bin of an even-length transform has no mirror image
	let scale = if n % 2 == 0 && best_idx == n/2 { 1.0 } else { 2.0 };

	Some(FourierPeak {
		frequency: (best_idx as f64) * sample_rate / (n as f64),
		amplitude: scale * best_norm / (n as f64),
	})
}

pub fn trace_peak(trace:&Trace) -> Option<FourierPeak> {
	fourier_peak(&trace.voltage, trace.sample_rate())
}
