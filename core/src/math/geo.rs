/// Mean Earth radius (IUGG), kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

pub struct GeoHelper;

impl GeoHelper {
    /// Great-circle distance in metres between two (lat, lon) points given in
    /// degrees. Missing coordinates yield NaN.
    pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
        let d_phi = (lat2 - lat1).to_radians();
        let d_lambda = (lon2 - lon1).to_radians();
        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * 1000.0 * c
    }

    pub fn meters_to_nmi(meters: f64) -> f64 {
        meters / METERS_PER_NAUTICAL_MILE
    }

    /// Sum of the great-circle steps between consecutive points, metres.
    /// Steps touching a missing coordinate are skipped.
    pub fn track_length_m(lat: &[f64], lon: &[f64]) -> f64 {
        lat.windows(2)
            .zip(lon.windows(2))
            .map(|(la, lo)| Self::haversine_m(la[0], lo[0], la[1], lo[1]))
            .filter(|step| step.is_finite())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = GeoHelper::haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn identical_points_are_zero_apart() {
        assert_eq!(GeoHelper::haversine_m(-54.2, -36.5, -54.2, -36.5), 0.0);
    }

    #[test]
    fn track_length_sums_consecutive_steps() {
        let lat = [0.0, 0.5, 1.0];
        let lon = [0.0, 0.0, 0.0];
        let whole = GeoHelper::haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((GeoHelper::track_length_m(&lat, &lon) - whole).abs() < 1e-6);
        assert!((GeoHelper::meters_to_nmi(1852.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_positions_are_skipped() {
        let lat = [0.0, f64::NAN, 1.0];
        let lon = [0.0, 0.0, 0.0];
        assert_eq!(GeoHelper::track_length_m(&lat, &lon), 0.0);
    }
}
