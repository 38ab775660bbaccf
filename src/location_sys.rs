use cgmath::Point2;


lazy_static! {
    static ref GAZETTEER: Vec<Place> = {
        vec![
            Place::new("Gulshan", 23.7925, 90.4078),
            Place::new("Banani", 23.7937, 90.4066),
            Place::new("Dhanmondi", 23.7461, 90.3742),
            Place::new("Uttara", 23.8759, 90.3795),
            Place::new("Mirpur", 23.8223, 90.3654),
            Place::new("Mohammadpur", 23.7662, 90.3589),
            Place::new("Bashundhara", 23.8193, 90.4526),
            Place::new("Motijheel", 23.7330, 90.4172),
            Place::new("Tejgaon", 23.7590, 90.3926),
            Place::new("Badda", 23.7806, 90.4265),
            Place::new("Farmgate", 23.7561, 90.3872),
            Place::new("Old Dhaka", 23.7104, 90.4074),
        ]
    };
}

pub const DEFAULT_LATITUDE: f64 = 23.8103;
pub const DEFAULT_LONGITUDE: f64 = 90.4125;


struct Place {
    name: &'static str,
    needle: String,
    latitude: f64,
    longitude: f64,
}

impl Place {
    fn new(name: &'static str, latitude: f64, longitude: f64) -> Self {
        Place {
            name,
            needle: name.to_lowercase(),
            latitude,
            longitude,
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    pub is_exact: bool,
}

impl ResolvedLocation {
    /// Map-space point, x is longitude.
    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.longitude, self.latitude)
    }
}


/// Never fails: unknown places land on the city center, flagged approximate.
pub fn resolve_location(location: &str) -> ResolvedLocation {
    if let Some((latitude, longitude)) = parse_coordinate_pair(location) {
        return ResolvedLocation {
            latitude,
            longitude,
            display_name: location.to_owned(),
            is_exact: true,
        };
    }

    let lowered = location.to_lowercase();

    match GAZETTEER.iter().find(|place| lowered.contains(&place.needle)) {
        Some(place) => ResolvedLocation {
            latitude: place.latitude,
            longitude: place.longitude,
            display_name: place.name.to_owned(),
            is_exact: false,
        },
        None => ResolvedLocation {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            display_name: location.to_owned(),
            is_exact: false,
        },
    }
}

fn parse_coordinate_pair(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.trim().split(',');
    let lat_part = parts.next()?;
    let lng_part = parts.next()?;

    if parts.next().is_some() {
        return None;
    }

    let lat = parse_decimal(lat_part)?;
    let lng = parse_decimal(lng_part)?;

    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
        Some((lat, lng))
    }
    else {
        None
    }
}

// Plain decimals only; rejects "inf", "NaN" and exponents that f64::from_str would take.
fn parse_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    let digits = text.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(text);

    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit());

    if valid {
        text.parse().ok()
    }
    else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_pairs_are_exact() {
        let loc = resolve_location("23.8103, 90.4125");
        assert!(loc.is_exact);
        assert_eq!(loc.latitude, 23.8103);
        assert_eq!(loc.longitude, 90.4125);
        assert_eq!(loc.display_name, "23.8103, 90.4125");

        let loc = resolve_location("-33.9,151");
        assert!(loc.is_exact);
        assert_eq!((loc.latitude, loc.longitude), (-33.9, 151.0));

        let loc = resolve_location("90 , -180");
        assert!(loc.is_exact);
    }

    #[test]
    fn boundary_grid_is_exact() {
        for &lat in [-90.0, -45.5, 0.0, 12.25, 90.0].iter() {
            for &lng in [-180.0, -0.5, 0.0, 99.125, 180.0].iter() {
                let loc = resolve_location(&format!("{},{}", lat, lng));
                assert!(loc.is_exact, "{},{}", lat, lng);
                assert_eq!((loc.latitude, loc.longitude), (lat, lng));
            }
        }
    }

    #[test]
    fn out_of_range_pairs_are_not_exact() {
        assert!(!resolve_location("91.0, 90.4").is_exact);
        assert!(!resolve_location("23.8, 180.5").is_exact);
        assert!(!resolve_location("inf, 10").is_exact);
        assert!(!resolve_location("1e1, 10").is_exact);
        assert!(!resolve_location("1, 2, 3").is_exact);
    }

    #[test]
    fn known_neighborhood_is_approximate() {
        let loc = resolve_location("near gulshan-2 circle");
        assert!(!loc.is_exact);
        assert_eq!(loc.display_name, "Gulshan");
        assert_eq!((loc.latitude, loc.longitude), (23.7925, 90.4078));
    }

    #[test]
    fn first_gazetteer_entry_wins() {
        let loc = resolve_location("Between Banani and Gulshan");
        assert_eq!(loc.display_name, "Gulshan");
    }

    #[test]
    fn unknown_place_falls_back_to_city_center() {
        for input in ["Somewhere else", "", "12.5 north"].iter() {
            let loc = resolve_location(input);
            assert!(!loc.is_exact);
            assert_eq!((loc.latitude, loc.longitude), (DEFAULT_LATITUDE, DEFAULT_LONGITUDE));
            assert_eq!(loc.display_name, *input);
        }
    }
}
