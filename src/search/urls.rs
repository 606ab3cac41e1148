use std::sync::Arc;
use url::form_urlencoded::Serializer;

use crate::models::{Coordinates, FuelFilter, SearchCriteria};

const MOBILE_DE_SEARCH: &str = "https://suchen.mobile.de/fahrzeuge/search.html";
const LEBONCOIN_SEARCH: &str = "https://www.leboncoin.fr/recherche";

/// Builds the marketplace search URL a scraping job starts from
pub trait SearchUrlBuilder: Send + Sync {
    fn search_url(&self, criteria: &SearchCriteria) -> String;
}

/// A city the locality filter knows coordinates for
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub coordinates: Coordinates,
}

/// Immutable city → coordinates table
#[derive(Debug, Clone, Default)]
pub struct CityDirectory {
    cities: Vec<City>,
}

impl CityDirectory {
    pub fn new(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// Case-insensitive lookup by name
    pub fn lookup(&self, name: &str) -> Option<&City> {
        let name = name.trim().to_lowercase();
        self.cities.iter().find(|city| city.name.to_lowercase() == name)
    }

    /// Main French cities
    pub fn french_cities() -> Self {
        const CITIES: &[(&str, f64, f64)] = &[
            ("Paris", 48.8566, 2.3522),
            ("Lyon", 45.764, 4.8357),
            ("Marseille", 43.2965, 5.3698),
            ("Toulouse", 43.6047, 1.4442),
            ("Nice", 43.7102, 7.262),
            ("Nantes", 47.2184, -1.5536),
            ("Strasbourg", 48.5734, 7.7521),
            ("Montpellier", 43.6108, 3.8767),
            ("Bordeaux", 44.8378, -0.5792),
            ("Lille", 50.6292, 3.0573),
            ("Rennes", 48.1173, -1.6778),
            ("Reims", 49.2583, 4.0317),
            ("Le Havre", 49.4944, 0.1079),
            ("Dijon", 47.322, 5.0415),
            ("Grenoble", 45.1885, 5.7245),
            ("Angers", 47.4784, -0.5632),
            ("Clermont-Ferrand", 45.7772, 3.087),
            ("Metz", 49.1193, 6.1757),
            ("Nancy", 48.6921, 6.1844),
            ("Mulhouse", 47.7508, 7.3359),
            ("Rouen", 49.4432, 1.0999),
            ("Caen", 49.1829, -0.3707),
            ("Orléans", 47.9029, 1.909),
            ("Tours", 47.3941, 0.6848),
            ("Limoges", 45.8336, 1.2611),
            ("Perpignan", 42.6986, 2.8956),
            ("Besançon", 47.2378, 6.0241),
            ("Brest", 48.3904, -4.4861),
            ("Amiens", 49.894, 2.2958),
            ("Poitiers", 46.5802, 0.3404),
        ];

        Self::new(
            CITIES
                .iter()
                .map(|&(name, latitude, longitude)| City {
                    name,
                    coordinates: Coordinates { latitude, longitude },
                })
                .collect(),
        )
    }
}

/// Year range in the `<min><sep><max>` form both sites use; `None` when open
fn year_range(criteria: &SearchCriteria, separator: char) -> Option<String> {
    match (criteria.year_min, criteria.year_max) {
        (None, None) => None,
        (min, max) => Some(format!(
            "{}{}{}",
            min.map(|y| y.to_string()).unwrap_or_default(),
            separator,
            max.map(|y| y.to_string()).unwrap_or_default()
        )),
    }
}

/// mobile.de (market A)
#[derive(Debug, Clone, Default)]
pub struct MobileDeUrlBuilder;

impl MobileDeUrlBuilder {
    fn fuel_code(fuel: FuelFilter) -> Option<&'static str> {
        match fuel {
            FuelFilter::All => None,
            FuelFilter::Diesel => Some("D"),
            FuelFilter::Petrol => Some("B"),
            FuelFilter::Hybrid => Some("H"),
            FuelFilter::Electric => Some("E"),
        }
    }
}

impl SearchUrlBuilder for MobileDeUrlBuilder {
    fn search_url(&self, criteria: &SearchCriteria) -> String {
        let mut query = Serializer::new(String::new());
        query
            .append_pair("dam", "false")
            .append_pair("isSearchRequest", "true")
            .append_pair("s", "Car")
            .append_pair("vc", "Car")
            .append_pair("sb", "rel")
            .append_pair("q", &criteria.query_text());

        if let Some(price_max) = criteria.price_max {
            query.append_pair("p", &format!(":{price_max}"));
        }
        if let Some(km_max) = criteria.km_max {
            query.append_pair("ml", &format!(":{km_max}"));
        }
        if let Some(years) = year_range(criteria, ':') {
            query.append_pair("fr", &years);
        }
        if let Some(code) = Self::fuel_code(criteria.fuel) {
            query.append_pair("ft", code);
        }

        format!("{}?{}", MOBILE_DE_SEARCH, query.finish())
    }
}

/// leboncoin (market B), with an optional radius search around a city
#[derive(Debug, Clone)]
pub struct LeboncoinUrlBuilder {
    cities: Arc<CityDirectory>,
}

impl LeboncoinUrlBuilder {
    pub fn new(cities: Arc<CityDirectory>) -> Self {
        Self { cities }
    }

    fn fuel_code(fuel: FuelFilter) -> Option<&'static str> {
        match fuel {
            FuelFilter::All => None,
            FuelFilter::Petrol => Some("1"),
            FuelFilter::Diesel => Some("2"),
            FuelFilter::Hybrid => Some("3"),
            FuelFilter::Electric => Some("4"),
        }
    }
}

impl Default for LeboncoinUrlBuilder {
    fn default() -> Self {
        Self::new(Arc::new(CityDirectory::french_cities()))
    }
}

impl SearchUrlBuilder for LeboncoinUrlBuilder {
    fn search_url(&self, criteria: &SearchCriteria) -> String {
        let mut query = Serializer::new(String::new());
        query
            .append_pair("category", "2")
            .append_pair("text", &criteria.query_text());

        if let Some(price_max) = criteria.price_max {
            query.append_pair("price", &format!("min-{price_max}"));
        }
        if let Some(km_max) = criteria.km_max {
            query.append_pair("mileage", &format!("min-{km_max}"));
        }
        if let Some(years) = year_range(criteria, '-') {
            query.append_pair("regdate", &years);
        }
        if let Some(code) = Self::fuel_code(criteria.fuel) {
            query.append_pair("fuel", code);
        }

        if let Some(locality) = criteria.locality.as_ref().filter(|l| l.radius_km > 0) {
            let coordinates = locality
                .coordinates
                .or_else(|| self.cities.lookup(&locality.city).map(|city| city.coordinates));
            if let Some(coordinates) = coordinates {
                query
                    .append_pair("lat", &format!("{:.5}", coordinates.latitude))
                    .append_pair("lng", &format!("{:.5}", coordinates.longitude))
                    .append_pair("radius", &(u64::from(locality.radius_km) * 1000).to_string());
            }
        }

        format!("{}?{}", LEBONCOIN_SEARCH, query.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Locality;

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            brand: "Renault".into(),
            model: "Kangoo".into(),
            year_min: Some(2015),
            year_max: Some(2024),
            km_max: Some(150_000),
            fuel: FuelFilter::Diesel,
            price_max: Some(15_000),
            locality: None,
        }
    }

    #[test]
    fn mobile_de_url_carries_all_filters() {
        let url = MobileDeUrlBuilder.search_url(&criteria());

        assert_eq!(
            url,
            "https://suchen.mobile.de/fahrzeuge/search.html?dam=false&isSearchRequest=true&s=Car&vc=Car&sb=rel\
             &q=Renault+Kangoo&p=%3A15000&ml=%3A150000&fr=2015%3A2024&ft=D"
        );
    }

    #[test]
    fn mobile_de_open_year_range() {
        let mut only_max = criteria();
        only_max.year_min = None;
        let mut only_min = criteria();
        only_min.year_max = None;

        assert!(MobileDeUrlBuilder.search_url(&only_max).contains("fr=%3A2024"));
        assert!(MobileDeUrlBuilder.search_url(&only_min).contains("fr=2015%3A&"));
    }

    #[test]
    fn leboncoin_url_without_locality() {
        let mut all_fuels = criteria();
        all_fuels.fuel = FuelFilter::All;

        let url = LeboncoinUrlBuilder::default().search_url(&all_fuels);

        assert_eq!(
            url,
            "https://www.leboncoin.fr/recherche?category=2&text=Renault+Kangoo\
             &price=min-15000&mileage=min-150000&regdate=2015-2024"
        );
    }

    #[test]
    fn leboncoin_resolves_city_coordinates() {
        let mut with_city = criteria();
        with_city.locality = Some(Locality {
            city: "lyon".into(),
            radius_km: 50,
            coordinates: None,
        });

        let url = LeboncoinUrlBuilder::default().search_url(&with_city);

        assert!(url.ends_with("&fuel=2&lat=45.76400&lng=4.83570&radius=50000"));
    }

    #[test]
    fn leboncoin_skips_location_for_city_only_or_unknown_city() {
        let mut city_only = criteria();
        city_only.locality = Some(Locality {
            city: "Lyon".into(),
            radius_km: 0,
            coordinates: None,
        });
        let mut unknown = criteria();
        unknown.locality = Some(Locality {
            city: "Atlantis".into(),
            radius_km: 100,
            coordinates: None,
        });

        let builder = LeboncoinUrlBuilder::default();
        assert!(!builder.search_url(&city_only).contains("lat="));
        assert!(!builder.search_url(&unknown).contains("lat="));
    }

    #[test]
    fn explicit_coordinates_win_over_directory() {
        let mut explicit = criteria();
        explicit.locality = Some(Locality {
            city: "Paris".into(),
            radius_km: 10,
            coordinates: Some(Coordinates {
                latitude: 1.5,
                longitude: -2.25,
            }),
        });

        let url = LeboncoinUrlBuilder::default().search_url(&explicit);

        assert!(url.contains("lat=1.50000&lng=-2.25000&radius=10000"));
    }

    #[test]
    fn directory_holds_french_cities() {
        let directory = CityDirectory::french_cities();
        assert_eq!(directory.lookup("Orléans").unwrap().coordinates.latitude, 47.9029);
        assert_eq!(directory.lookup("  BREST ").unwrap().name, "Brest");
        assert!(directory.lookup("Berlin").is_none());
    }
}
