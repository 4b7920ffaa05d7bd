/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres between two latitude/longitude pairs
/// given in degrees, using the haversine formula.
///
/// Inputs are not validated. Out-of-range coordinates yield a defined but
/// meaningless number; non-finite coordinates yield NaN.
pub fn distance(
	lat1: f64,
	lon1: f64,
	lat2: f64,
	lon2: f64,
) -> f64 {
	let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
	let d_phi = (lat2 - lat1).to_radians();
	let d_lambda = (lon2 - lon1).to_radians();

	let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

	// rounding can push `a` a hair above 1 for antipodal points
	2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}
